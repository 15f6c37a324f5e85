use crate::context::{parse_signature, Context};
use crate::error::CliResult;

pub async fn execute(
    ctx: &Context,
    commitment: String,
    milestone: String,
    early_review: bool,
    signature: String,
) -> CliResult<()> {
    let signature = parse_signature(&signature)?;
    let milestone = ctx
        .commitments()
        .complete_milestone(&commitment, &milestone, early_review, &signature)
        .await?;
    println!("milestone {} marked delivered", milestone.id);
    if let Some(claimable_at) = milestone.claimable_at_unix {
        println!("  claimable at: {claimable_at}");
    }
    if early_review {
        println!("  review window opened immediately");
    }
    Ok(())
}
