use crate::context::Context;
use crate::error::CliResult;

pub async fn execute(ctx: &Context, commitment: String) -> CliResult<()> {
    let commitment = ctx.commitments().force_unstick(&commitment).await?;
    println!(
        "resolving lock released; commitment {} restored to {}",
        commitment.id, commitment.status
    );
    Ok(())
}
