pub mod activate;
pub mod add_milestone;
pub mod cast_vote;
pub mod claim;
pub mod claim_all;
pub mod complete_milestone;
pub mod force_unstick;
pub mod fund;
pub mod issue_personal;
pub mod issue_reward;
pub mod release_milestone;
pub mod resolve;
pub mod rotate_fee_shares;
pub mod settle_milestone;
pub mod status;

use crate::context::{parse_pubkey, Context};
use crate::error::{CliError, CliResult};
use covenant_protocol_core::SignerRef;
use solana_sdk::{pubkey::Pubkey, signature::read_keypair_file, signer::Signer};
use std::path::PathBuf;

/// Turn the issuance flags into an escrow pubkey and signer reference:
/// either a local keypair file sealed into the vault, or a custodial
/// "wallet-id:escrow-pubkey" pair.
pub fn resolve_escrow(
    ctx: &Context,
    escrow_keypair: Option<PathBuf>,
    custodial_wallet: Option<String>,
) -> CliResult<(Pubkey, SignerRef)> {
    match (escrow_keypair, custodial_wallet) {
        (Some(path), None) => {
            let keypair = read_keypair_file(&path).map_err(|e| {
                CliError::InvalidArgument(format!(
                    "cannot read keypair {}: {e}",
                    path.display()
                ))
            })?;
            let ciphertext = ctx.vault()?.encrypt(&keypair)?;
            Ok((keypair.pubkey(), SignerRef::Local { ciphertext }))
        }
        (None, Some(spec)) => {
            let (wallet_id, escrow) = spec.split_once(':').ok_or_else(|| {
                CliError::InvalidArgument(
                    "custodial wallet must be \"wallet-id:escrow-pubkey\"".to_string(),
                )
            })?;
            let escrow = parse_pubkey("custodial escrow", escrow)?;
            Ok((
                escrow,
                SignerRef::Custodial {
                    wallet_id: wallet_id.to_string(),
                },
            ))
        }
        _ => Err(CliError::InvalidArgument(
            "exactly one of --escrow-keypair and --custodial-wallet is required".to_string(),
        )),
    }
}
