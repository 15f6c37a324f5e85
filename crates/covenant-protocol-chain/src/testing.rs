//! In-process fakes for the chain boundary.

use crate::{ChainClient, ChainError, ChainResult, CustodialSigner, EscrowSigner};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// One transfer the mock executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransfer {
    pub from: Pubkey,
    pub to: Pubkey,
    pub lamports: u64,
    pub signature: Signature,
}

/// Failure injected into the next transfer call(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailure {
    Timeout,
    Hard,
}

struct MockState {
    balances: HashMap<Pubkey, u64>,
    transfers: Vec<RecordedTransfer>,
    failures: Vec<TransferFailure>,
}

/// Programmable [`ChainClient`]: balances and the clock are set by the
/// test, transfers are recorded, and failures can be queued. The transfer
/// counter is atomic so concurrent claim tests can assert at-most-once
/// delivery.
pub struct MockChainClient {
    state: Mutex<MockState>,
    now: AtomicI64,
    transfer_count: AtomicUsize,
}

impl MockChainClient {
    pub fn new(now: i64) -> Self {
        Self {
            state: Mutex::new(MockState {
                balances: HashMap::new(),
                transfers: Vec::new(),
                failures: Vec::new(),
            }),
            now: AtomicI64::new(now),
            transfer_count: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, pubkey: Pubkey, lamports: u64) {
        let mut state = self.state.lock().unwrap();
        state.balances.insert(pubkey, lamports);
    }

    pub fn set_now(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance_time(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Queue a failure for an upcoming transfer; failures are consumed in
    /// FIFO order before any successful transfer executes.
    pub fn fail_next_transfer(&self, failure: TransferFailure) {
        let mut state = self.state.lock().unwrap();
        state.failures.push(failure);
    }

    pub fn transfers(&self) -> Vec<RecordedTransfer> {
        self.state.lock().unwrap().transfers.clone()
    }

    /// Number of successful transfers executed.
    pub fn transfer_count(&self) -> usize {
        self.transfer_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_balance(&self, pubkey: &Pubkey) -> ChainResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(pubkey).copied().unwrap_or(0))
    }

    async fn current_unix_time(&self) -> ChainResult<i64> {
        Ok(self.now.load(Ordering::SeqCst))
    }

    async fn transfer(
        &self,
        signer: &EscrowSigner,
        to: &Pubkey,
        lamports: u64,
    ) -> ChainResult<Signature> {
        let from = signer.pubkey();
        let mut state = self.state.lock().unwrap();

        if !state.failures.is_empty() {
            match state.failures.remove(0) {
                TransferFailure::Timeout => {
                    return Err(ChainError::TransferTimeout {
                        attempts: 1,
                        last_error: "injected timeout".to_string(),
                    })
                }
                TransferFailure::Hard => {
                    return Err(ChainError::TransferFailed(
                        "injected failure".to_string(),
                    ))
                }
            }
        }

        let available = state.balances.get(&from).copied().unwrap_or(0);
        if available < lamports {
            return Err(ChainError::TransferFailed(format!(
                "insufficient escrow balance: need {lamports}, have {available}"
            )));
        }
        state.balances.insert(from, available - lamports);
        *state.balances.entry(*to).or_insert(0) += lamports;

        let signature = Signature::new_unique();
        state.transfers.push(RecordedTransfer {
            from,
            to: *to,
            lamports,
            signature,
        });
        self.transfer_count.fetch_add(1, Ordering::SeqCst);
        Ok(signature)
    }

    fn verify_signature(&self, message: &[u8], signature: &Signature, pubkey: &Pubkey) -> bool {
        signature.verify(pubkey.as_ref(), message)
    }
}

/// Custodian fake holding the keypairs for known wallet ids. Signs the
/// serialized transaction exactly the way the real custodian boundary is
/// specified to: bytes in, signed bytes out.
pub struct MockCustodialSigner {
    keys: HashMap<String, Keypair>,
}

impl MockCustodialSigner {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    pub fn register(mut self, wallet_id: impl Into<String>, keypair: Keypair) -> Self {
        self.keys.insert(wallet_id.into(), keypair);
        self
    }
}

impl Default for MockCustodialSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustodialSigner for MockCustodialSigner {
    async fn sign(&self, wallet_id: &str, tx_bytes: &[u8]) -> ChainResult<Vec<u8>> {
        let keypair = self.keys.get(wallet_id).ok_or_else(|| {
            ChainError::Custodial(format!("unknown custodial wallet {wallet_id}"))
        })?;

        let (mut transaction, _) = bincode::serde::decode_from_slice::<Transaction, _>(
            tx_bytes,
            bincode::config::legacy(),
        )
        .map_err(|e| ChainError::Custodial(e.to_string()))?;

        let recent_blockhash = transaction.message.recent_blockhash;
        transaction
            .try_sign(&[keypair], recent_blockhash)
            .map_err(|e| ChainError::Custodial(e.to_string()))?;

        bincode::serde::encode_to_vec(&transaction, bincode::config::legacy())
            .map_err(|e| ChainError::Custodial(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecretVault;
    use solana_sdk::signer::Signer;

    #[tokio::test]
    async fn test_transfer_moves_balances_and_records() {
        let chain = MockChainClient::new(1_700_000_000);
        let keypair = Keypair::new();
        let escrow = keypair.pubkey();
        let recipient = Pubkey::new_unique();
        chain.set_balance(escrow, 1_000);

        let signer = EscrowSigner::Local(keypair);
        let sig = chain.transfer(&signer, &recipient, 400).await.unwrap();

        assert_eq!(chain.get_balance(&escrow).await.unwrap(), 600);
        assert_eq!(chain.get_balance(&recipient).await.unwrap(), 400);
        assert_eq!(chain.transfer_count(), 1);
        assert_eq!(chain.transfers()[0].signature, sig);
    }

    #[tokio::test]
    async fn test_injected_failures_consume_in_order() {
        let chain = MockChainClient::new(0);
        let keypair = Keypair::new();
        chain.set_balance(keypair.pubkey(), 100);
        chain.fail_next_transfer(TransferFailure::Timeout);
        chain.fail_next_transfer(TransferFailure::Hard);
        let signer = EscrowSigner::Local(keypair);
        let to = Pubkey::new_unique();

        let first = chain.transfer(&signer, &to, 10).await.unwrap_err();
        assert!(first.is_timeout());
        let second = chain.transfer(&signer, &to, 10).await.unwrap_err();
        assert!(matches!(second, ChainError::TransferFailed(_)));

        assert!(chain.transfer(&signer, &to, 10).await.is_ok());
        assert_eq!(chain.transfer_count(), 1);
    }

    #[tokio::test]
    async fn test_overdraw_is_a_hard_failure() {
        let chain = MockChainClient::new(0);
        let keypair = Keypair::new();
        chain.set_balance(keypair.pubkey(), 5);
        let signer = EscrowSigner::Local(keypair);

        let err = chain
            .transfer(&signer, &Pubkey::new_unique(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::TransferFailed(_)));
        assert_eq!(chain.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_verifies_real_signatures() {
        let chain = MockChainClient::new(0);
        let keypair = Keypair::new();
        let message = b"vote:c-1::approve";
        let signature = keypair.sign_message(message);

        assert!(chain.verify_signature(message, &signature, &keypair.pubkey()));
        assert!(!chain.verify_signature(b"other", &signature, &keypair.pubkey()));
    }

    #[tokio::test]
    async fn test_custodial_signer_round_trip() {
        use solana_sdk::{hash::Hash, message::Message, system_instruction};

        let keypair = Keypair::new();
        let from = keypair.pubkey();
        let custodian = MockCustodialSigner::new().register("custody-1", keypair);

        let instruction = system_instruction::transfer(&from, &Pubkey::new_unique(), 7);
        let message = Message::new_with_blockhash(&[instruction], Some(&from), &Hash::new_unique());
        let unsigned = Transaction::new_unsigned(message);
        let bytes =
            bincode::serde::encode_to_vec(&unsigned, bincode::config::legacy()).unwrap();

        let signed_bytes = custodian.sign("custody-1", &bytes).await.unwrap();
        let (signed, _) = bincode::serde::decode_from_slice::<Transaction, _>(
            &signed_bytes,
            bincode::config::legacy(),
        )
        .unwrap();
        assert!(signed.verify().is_ok());

        assert!(custodian.sign("unknown", &bytes).await.is_err());
    }

    #[test]
    fn test_vault_resolution_feeds_the_mock() {
        let vault = SecretVault::from_passphrase("p");
        let keypair = Keypair::new();
        let escrow = keypair.pubkey();
        let blob = vault.encrypt(&keypair).unwrap();
        let signer_ref = covenant_protocol_core::SignerRef::Local { ciphertext: blob };

        let signer = vault.resolve_signer(&signer_ref, &escrow).unwrap();
        assert_eq!(signer.pubkey(), escrow);
    }
}
