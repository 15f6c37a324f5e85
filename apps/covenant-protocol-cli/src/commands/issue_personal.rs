use super::resolve_escrow;
use crate::context::{parse_pubkey, Context};
use crate::error::CliResult;
use std::path::PathBuf;

pub async fn execute(
    ctx: &Context,
    owner: String,
    escrow_keypair: Option<PathBuf>,
    custodial_wallet: Option<String>,
    amount: u64,
    deadline: i64,
) -> CliResult<()> {
    let owner = parse_pubkey("owner", &owner)?;
    let (escrow, signer_ref) = resolve_escrow(ctx, escrow_keypair, custodial_wallet)?;

    let commitment = ctx
        .commitments()
        .issue_personal(owner, escrow, signer_ref, amount, deadline)
        .await?;
    println!("issued personal commitment {}", commitment.id);
    println!("  escrow:   {}", commitment.escrow_pubkey);
    println!("  amount:   {} lamports", amount);
    println!("  deadline: {}", deadline);
    println!("fund the escrow, then run `activate {}`", commitment.id);
    Ok(())
}
