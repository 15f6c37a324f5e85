#![allow(dead_code)]

use covenant_protocol_chain::{testing::MockChainClient, SecretVault};
use covenant_protocol_core::{Commitment, SignerRef, Vote};
use covenant_protocol_engine::{
    ClaimService, CommitmentService, EngineConfig, RotationConfig, SettlementEngine, VoteOutcome,
    VotingService,
};
use covenant_protocol_store::MemoryStore;
use rust_decimal::Decimal;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use std::sync::Arc;

pub const NOW: i64 = 1_700_000_000;
pub const SOL: u64 = 1_000_000_000;

/// In-memory wiring for engine tests: memory store, mock chain, real
/// vault, default config with a parseable treasury wallet.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub chain: Arc<MockChainClient>,
    pub vault: Arc<SecretVault>,
    pub config: EngineConfig,
    pub treasury: String,
}

impl Harness {
    pub fn new() -> Self {
        let treasury = Pubkey::new_unique().to_string();
        let config = EngineConfig {
            treasury_wallet: treasury.clone(),
            rotation: RotationConfig {
                base_wallet: Pubkey::new_unique().to_string(),
                ..RotationConfig::default()
            },
            ..EngineConfig::default()
        };
        Self {
            store: Arc::new(MemoryStore::new()),
            chain: Arc::new(MockChainClient::new(NOW)),
            vault: Arc::new(SecretVault::from_passphrase("engine-tests")),
            config,
            treasury,
        }
    }

    pub fn with_config(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn commitments(&self) -> CommitmentService {
        CommitmentService::new(self.store.clone(), self.chain.clone(), self.config.clone())
    }

    pub fn voting(&self) -> VotingService {
        VotingService::new(self.store.clone(), self.chain.clone(), self.config.clone())
    }

    pub fn settlement(&self) -> SettlementEngine {
        SettlementEngine::new(
            self.store.clone(),
            self.chain.clone(),
            self.vault.clone(),
            self.config.clone(),
        )
    }

    pub fn claims(&self) -> ClaimService {
        ClaimService::new(
            self.store.clone(),
            self.chain.clone(),
            self.vault.clone(),
            self.config.clone(),
        )
    }

    pub fn local_signer(&self, escrow: &Keypair) -> SignerRef {
        SignerRef::Local {
            ciphertext: self.vault.encrypt(escrow).unwrap(),
        }
    }

    /// Issue and activate a personal commitment whose escrow the mock
    /// chain already funds.
    pub async fn funded_personal(
        &self,
        owner: &Keypair,
        escrow: &Keypair,
        amount: u64,
        deadline: i64,
    ) -> Commitment {
        self.chain.set_balance(escrow.pubkey(), amount);
        let commitment = self
            .commitments()
            .issue_personal(
                owner.pubkey(),
                escrow.pubkey(),
                self.local_signer(escrow),
                amount,
                deadline,
            )
            .await
            .unwrap();
        self.commitments().activate(&commitment.id).await.unwrap()
    }

    /// Issue, fund and activate a reward commitment.
    pub async fn funded_reward(
        &self,
        owner: &Keypair,
        escrow: &Keypair,
        amount: u64,
    ) -> Commitment {
        self.chain.set_balance(escrow.pubkey(), amount);
        let commitment = self
            .commitments()
            .issue_reward(owner.pubkey(), escrow.pubkey(), self.local_signer(escrow))
            .await
            .unwrap();
        let commitment = self
            .commitments()
            .fund_reward(&commitment.id, amount)
            .await
            .unwrap();
        self.commitments().activate(&commitment.id).await.unwrap();
        self.commitments()
            .load(&commitment.id)
            .await
            .unwrap()
            .commitment
    }

    pub fn vote_signature(
        &self,
        voter: &Keypair,
        commitment_id: &str,
        milestone_id: Option<&str>,
        vote: Vote,
    ) -> Signature {
        let message = format!(
            "vote:{commitment_id}:{}:{vote}",
            milestone_id.unwrap_or_default()
        );
        voter.sign_message(message.as_bytes())
    }

    pub fn completion_signature(
        &self,
        owner: &Keypair,
        commitment_id: &str,
        milestone_id: &str,
    ) -> Signature {
        owner.sign_message(format!("complete:{commitment_id}:{milestone_id}").as_bytes())
    }

    pub async fn cast(
        &self,
        voter: &Keypair,
        commitment_id: &str,
        milestone_id: Option<&str>,
        vote: Vote,
        weight_usd: Decimal,
    ) -> VoteOutcome {
        let signature = self.vote_signature(voter, commitment_id, milestone_id, vote);
        self.voting()
            .record_vote(
                commitment_id,
                milestone_id,
                &voter.pubkey().to_string(),
                vote,
                weight_usd,
                &signature,
            )
            .await
            .unwrap()
    }
}
