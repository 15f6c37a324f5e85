use crate::context::Context;
use crate::error::CliResult;

pub async fn execute(ctx: &Context, commitment: String) -> CliResult<()> {
    let commitment = ctx.commitments().activate(&commitment).await?;
    println!("commitment {} is now {}", commitment.id, commitment.status);
    Ok(())
}
