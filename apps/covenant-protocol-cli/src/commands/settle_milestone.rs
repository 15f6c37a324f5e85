use crate::context::Context;
use crate::error::CliResult;

pub async fn execute(ctx: &Context, commitment: String, milestone: String) -> CliResult<()> {
    let distribution = ctx
        .settlement()?
        .settle_milestone_failure(&commitment, &milestone)
        .await?;
    println!(
        "milestone failure settled: {} lamports forfeited",
        distribution.pot_lamports
    );
    println!("  distribution: {}", distribution.id);
    Ok(())
}
