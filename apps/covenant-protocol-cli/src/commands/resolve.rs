use crate::context::Context;
use crate::error::CliResult;
use covenant_protocol_engine::Resolution;

pub async fn execute(ctx: &Context, commitment: String) -> CliResult<()> {
    let resolution = ctx.settlement()?.resolve_personal(&commitment).await?;
    match resolution {
        Resolution::Success { tx_sig } => {
            println!("commitment approved; escrow returned to owner");
            println!("  tx: {tx_sig}");
        }
        Resolution::Failure { distribution_id } => {
            println!("commitment rejected; failure distribution created");
            println!("  distribution: {distribution_id}");
            println!("run `claim-all {distribution_id}` to pay it out");
        }
    }
    Ok(())
}
