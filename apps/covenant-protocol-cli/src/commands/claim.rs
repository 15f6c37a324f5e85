use crate::context::Context;
use crate::error::CliResult;
use covenant_protocol_engine::ClaimOutcome;

pub async fn execute(ctx: &Context, distribution: String, wallet: String) -> CliResult<()> {
    let outcome = ctx.claims()?.claim(&distribution, &wallet).await?;
    match outcome {
        ClaimOutcome::Paid { tx_sig } => println!("claim paid: {tx_sig}"),
        ClaimOutcome::AlreadyPaid { tx_sig } => println!("already paid: {tx_sig}"),
    }
    Ok(())
}
