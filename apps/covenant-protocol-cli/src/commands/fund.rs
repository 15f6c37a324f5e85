use crate::context::Context;
use crate::error::CliResult;

pub async fn execute(ctx: &Context, commitment: String, amount: u64) -> CliResult<()> {
    let commitment = ctx.commitments().fund_reward(&commitment, amount).await?;
    println!(
        "commitment {} now recognizes {} lamports of funding",
        commitment.id, commitment.total_funded_lamports
    );
    Ok(())
}
