use crate::context::Context;
use crate::error::CliResult;

pub async fn execute(ctx: &Context, distribution: String) -> CliResult<()> {
    let sweep = ctx.claims()?.claim_all(&distribution).await?;
    println!(
        "claim sweep: {} paid, {} already paid, {} failed",
        sweep.paid, sweep.already_paid, sweep.failed
    );
    if sweep.failed > 0 {
        println!("rerun claim-all to retry the failures");
    }
    Ok(())
}
