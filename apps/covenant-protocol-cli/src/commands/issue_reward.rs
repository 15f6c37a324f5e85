use super::resolve_escrow;
use crate::context::{parse_pubkey, Context};
use crate::error::CliResult;
use std::path::PathBuf;

pub async fn execute(
    ctx: &Context,
    owner: String,
    escrow_keypair: Option<PathBuf>,
    custodial_wallet: Option<String>,
) -> CliResult<()> {
    let owner = parse_pubkey("owner", &owner)?;
    let (escrow, signer_ref) = resolve_escrow(ctx, escrow_keypair, custodial_wallet)?;

    let commitment = ctx
        .commitments()
        .issue_reward(owner, escrow, signer_ref)
        .await?;
    println!("issued reward commitment {}", commitment.id);
    println!("  escrow: {}", commitment.escrow_pubkey);
    Ok(())
}
