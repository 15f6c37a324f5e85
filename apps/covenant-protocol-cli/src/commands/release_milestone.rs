use crate::context::Context;
use crate::error::CliResult;

pub async fn execute(ctx: &Context, commitment: String, milestone: String) -> CliResult<()> {
    let distribution = ctx
        .settlement()?
        .release_milestone(&commitment, &milestone)
        .await?;
    println!("vote-reward distribution ready: {}", distribution.id);
    println!(
        "  owner share: {} lamports, voter pot: {} lamports across {} voters",
        distribution.primary_lamports,
        distribution.voter_pot_lamports,
        distribution.allocation_count
    );
    println!("the milestone releases when the owner's claim finalizes");
    Ok(())
}
