use crate::context::Context;
use crate::error::CliResult;
use covenant_protocol_engine::MilestoneSpec;

pub async fn execute(
    ctx: &Context,
    commitment: String,
    description: String,
    lamports: Option<u64>,
    percent: Option<u8>,
    due_at: Option<i64>,
) -> CliResult<()> {
    let spec = MilestoneSpec {
        description,
        unlock_lamports: lamports,
        unlock_percent: percent,
        due_at_unix: due_at,
    };
    let milestone = ctx.commitments().add_milestone(&commitment, spec).await?;
    println!(
        "added milestone {} at position {}",
        milestone.id, milestone.position
    );
    Ok(())
}
