use crate::{ChainConfig, ChainError, ChainResult, EscrowSigner};
use async_trait::async_trait;
use backoff::future::retry;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
    transaction::Transaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The chain operations the engine depends on. Implementations must be
/// safe to call concurrently; the engine never serializes around them.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, pubkey: &Pubkey) -> ChainResult<u64>;

    /// Cluster time, from the most recent block.
    async fn current_unix_time(&self) -> ChainResult<i64>;

    /// Move `lamports` out of the signer's escrow. Bounded retry inside;
    /// exhausted retries surface as [`ChainError::TransferTimeout`], which
    /// callers must treat as "may have landed".
    async fn transfer(
        &self,
        signer: &EscrowSigner,
        to: &Pubkey,
        lamports: u64,
    ) -> ChainResult<Signature>;

    /// Ed25519 verification of an off-chain authorization message.
    fn verify_signature(&self, message: &[u8], signature: &Signature, pubkey: &Pubkey) -> bool;
}

/// Boundary to the external key custodian: give it unsigned transaction
/// bytes, get fully signed bytes back. The real HTTP custodian lives
/// outside this repo.
#[async_trait]
pub trait CustodialSigner: Send + Sync {
    async fn sign(&self, wallet_id: &str, tx_bytes: &[u8]) -> ChainResult<Vec<u8>>;
}

/// RPC-backed [`ChainClient`].
pub struct RpcChainClient {
    rpc_client: Arc<RpcClient>,
    custodial: Option<Arc<dyn CustodialSigner>>,
    config: ChainConfig,
}

impl RpcChainClient {
    pub fn new(config: ChainConfig) -> Self {
        let rpc_client = Arc::new(RpcClient::new_with_commitment(
            config.rpc_url.clone(),
            config.confirmation_commitment,
        ));
        Self {
            rpc_client,
            custodial: None,
            config,
        }
    }

    /// Attach the custodian used for `SignerRef::Custodial` escrows.
    pub fn with_custodial_signer(mut self, custodial: Arc<dyn CustodialSigner>) -> Self {
        self.custodial = Some(custodial);
        self
    }

    async fn signed_transaction(
        &self,
        signer: &EscrowSigner,
        message: Message,
    ) -> Result<Transaction, backoff::Error<ChainError>> {
        let recent_blockhash = message.recent_blockhash;
        match signer {
            EscrowSigner::Local(keypair) => {
                let mut transaction = Transaction::new_unsigned(message);
                transaction
                    .try_sign(&[keypair], recent_blockhash)
                    .map_err(|e| {
                        backoff::Error::Permanent(ChainError::Signing(e.to_string()))
                    })?;
                Ok(transaction)
            }
            EscrowSigner::Custodial { wallet_id, .. } => {
                let custodial = self.custodial.as_ref().ok_or_else(|| {
                    backoff::Error::Permanent(ChainError::Custodial(
                        "no custodial signer configured".to_string(),
                    ))
                })?;

                let transaction = Transaction::new_unsigned(message);
                let unsigned = bincode::serde::encode_to_vec(&transaction, bincode::config::legacy())
                    .map_err(|e| {
                        backoff::Error::Permanent(ChainError::Signing(e.to_string()))
                    })?;

                let signed = custodial
                    .sign(wallet_id, &unsigned)
                    .await
                    .map_err(backoff::Error::Permanent)?;

                let (transaction, _) = bincode::serde::decode_from_slice::<Transaction, _>(
                    &signed,
                    bincode::config::legacy(),
                )
                .map_err(|e| {
                    backoff::Error::Permanent(ChainError::Custodial(format!(
                        "custodian returned undecodable bytes: {e}"
                    )))
                })?;
                transaction.verify().map_err(|e| {
                    backoff::Error::Permanent(ChainError::Custodial(format!(
                        "custodian signature did not verify: {e}"
                    )))
                })?;
                Ok(transaction)
            }
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_balance(&self, pubkey: &Pubkey) -> ChainResult<u64> {
        Ok(self.rpc_client.get_balance(pubkey).await?)
    }

    async fn current_unix_time(&self) -> ChainResult<i64> {
        let slot = self.rpc_client.get_slot().await?;
        self.rpc_client
            .get_block_time(slot)
            .await
            .map_err(|e| ChainError::Clock(e.to_string()))
    }

    async fn transfer(
        &self,
        signer: &EscrowSigner,
        to: &Pubkey,
        lamports: u64,
    ) -> ChainResult<Signature> {
        let from = signer.pubkey();
        let instruction = system_instruction::transfer(&from, to, lamports);
        let backoff = self.config.retry_backoff.clone();
        let max_retries = self.config.max_retries;
        let commitment = self.config.confirmation_commitment;
        let attempts = AtomicUsize::new(0);

        retry(backoff, || {
            let instruction = instruction.clone();
            let rpc_client = self.rpc_client.clone();
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;

            async move {
                // Fresh blockhash per attempt.
                let recent_blockhash = rpc_client
                    .get_latest_blockhash()
                    .await
                    .map_err(|e| backoff::Error::Permanent(ChainError::RpcClient(e)))?;
                let message =
                    Message::new_with_blockhash(&[instruction], Some(&from), &recent_blockhash);
                let transaction = self.signed_transaction(signer, message).await?;

                match rpc_client
                    .send_and_confirm_transaction_with_spinner_and_commitment(
                        &transaction,
                        commitment,
                    )
                    .await
                {
                    Ok(signature) => {
                        debug!(%signature, %from, %to, lamports, "transfer confirmed");
                        Ok(signature)
                    }
                    Err(e) => {
                        warn!(%from, %to, lamports, attempt, error = %e, "transfer attempt failed");
                        Err(classify_send_error(e.to_string(), attempt, max_retries))
                    }
                }
            }
        })
        .await
    }

    fn verify_signature(&self, message: &[u8], signature: &Signature, pubkey: &Pubkey) -> bool {
        signature.verify(pubkey.as_ref(), message)
    }
}

/// Sort a failed send into the retry machinery. Blockhash, timeout and
/// connection errors retry until the attempt cap, then surface as
/// [`ChainError::TransferTimeout`] with the real attempt count; anything
/// else is permanent.
fn classify_send_error(
    error_str: String,
    attempt: usize,
    max_retries: usize,
) -> backoff::Error<ChainError> {
    let retryable = error_str.contains("blockhash")
        || error_str.contains("timeout")
        || error_str.contains("connection");
    if !retryable {
        return backoff::Error::Permanent(ChainError::TransferFailed(error_str));
    }

    let err = ChainError::TransferTimeout {
        attempts: attempt,
        last_error: error_str,
    };
    if attempt >= max_retries {
        backoff::Error::Permanent(err)
    } else {
        backoff::Error::Transient {
            err,
            retry_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_stay_transient_below_the_attempt_cap() {
        match classify_send_error("unable to confirm: timeout".to_string(), 2, 5) {
            backoff::Error::Transient { err, .. } => assert!(err.is_timeout()),
            other => panic!("expected a transient timeout, got {other:?}"),
        }
    }

    #[test]
    fn the_attempt_cap_turns_timeouts_permanent_with_the_real_count() {
        match classify_send_error("blockhash not found".to_string(), 5, 5) {
            backoff::Error::Permanent(ChainError::TransferTimeout {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("blockhash"));
            }
            other => panic!("expected a permanent timeout, got {other:?}"),
        }
    }

    #[test]
    fn non_retryable_errors_fail_on_the_first_attempt() {
        match classify_send_error("insufficient funds for fee".to_string(), 1, 5) {
            backoff::Error::Permanent(ChainError::TransferFailed(_)) => {}
            other => panic!("expected a permanent failure, got {other:?}"),
        }
    }
}
