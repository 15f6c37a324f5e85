//! The three-phase idempotent claim protocol.
//!
//! 1. Acquire: conditional insert of the (distribution, wallet) claim row.
//! 2. Execute: escrow transfer through the chain boundary.
//! 3. Finalize: record the signature, then run the distribution / milestone
//!    follow-ups.
//!
//! The unsigned claim row is the in-flight marker. A timed-out transfer
//! leaves it in place (the transfer may still land; the TTL reaps it); a
//! hard failure deletes it so the wallet can re-acquire immediately.

use crate::{EngineConfig, EngineError, EngineResult};
use covenant_protocol_chain::{ChainClient, ChainError, SecretVault};
use covenant_protocol_core::{
    Claim, CommitmentStatus, Distribution, DistributionKind, MilestoneStatus,
};
use covenant_protocol_store::{ClaimAcquire, CommitmentStore};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CLAIM_SWEEP_PARALLELISM: usize = 4;

/// Result of a claim call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Paid { tx_sig: String },
    /// A finalized claim already exists; idempotent success carrying the
    /// original signature.
    AlreadyPaid { tx_sig: String },
}

/// Tallied results of a [`ClaimService::claim_all`] sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSweep {
    pub paid: u32,
    pub already_paid: u32,
    pub failed: u32,
}

pub struct ClaimService {
    store: Arc<dyn CommitmentStore>,
    chain: Arc<dyn ChainClient>,
    vault: Arc<SecretVault>,
    config: EngineConfig,
}

impl ClaimService {
    pub fn new(
        store: Arc<dyn CommitmentStore>,
        chain: Arc<dyn ChainClient>,
        vault: Arc<SecretVault>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            chain,
            vault,
            config,
        }
    }

    /// Claim a wallet's share of a distribution. At most one transfer ever
    /// executes per (distribution, wallet); concurrent callers serialize on
    /// the claim-row insert.
    pub async fn claim(&self, distribution_id: &str, wallet: &str) -> EngineResult<ClaimOutcome> {
        let distribution = self
            .store
            .fetch_distribution(distribution_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("distribution {distribution_id}")))?;
        let amount = self.share_of(&distribution, wallet).await?;
        let recipient = Pubkey::from_str(wallet)
            .map_err(|_| EngineError::Validation(format!("invalid claim wallet {wallet}")))?;
        let now = self.chain.current_unix_time().await?;

        // Phase 1: acquire.
        if let Some(tx_sig) = self
            .acquire_claim_row(distribution_id, wallet, amount, now)
            .await?
        {
            return Ok(ClaimOutcome::AlreadyPaid { tx_sig });
        }

        // Phase 2: execute.
        let commitment = self
            .store
            .fetch_commitment(&distribution.commitment_id)
            .await?
            .ok_or_else(|| {
                EngineError::Invariant(format!(
                    "distribution {distribution_id} references missing commitment {}",
                    distribution.commitment_id
                ))
            })?;
        let signer = match self
            .vault
            .resolve_signer(&commitment.signer_ref, &commitment.escrow_pubkey)
        {
            Ok(signer) => signer,
            Err(e) => {
                self.store
                    .delete_unsigned_claim(distribution_id, wallet)
                    .await?;
                return Err(e.into());
            }
        };
        let tx_sig = match self.chain.transfer(&signer, &recipient, amount).await {
            Ok(signature) => signature.to_string(),
            Err(e @ ChainError::TransferTimeout { .. }) => {
                // May have landed: the unsigned row stays until the TTL
                // reaps it or a retry resumes.
                warn!(distribution = %distribution_id, wallet, "claim transfer timed out");
                return Err(e.into());
            }
            Err(e) => {
                self.store
                    .delete_unsigned_claim(distribution_id, wallet)
                    .await?;
                return Err(e.into());
            }
        };

        // Phase 3: finalize.
        let finalized = self
            .store
            .finalize_claim(distribution_id, wallet, &tx_sig)
            .await?;
        if !finalized {
            return Err(EngineError::Invariant(format!(
                "claim row ({distribution_id}, {wallet}) vanished before finalize"
            )));
        }
        info!(distribution = %distribution_id, wallet, amount, %tx_sig, "claim paid");

        if distribution.kind == DistributionKind::VoteReward
            && wallet == distribution.primary_wallet
        {
            self.owner_claim_hook(&distribution, &tx_sig, now).await?;
        }
        self.maybe_complete_distribution(&distribution).await?;

        Ok(ClaimOutcome::Paid { tx_sig })
    }

    /// Claim every share of a distribution with bounded parallelism.
    /// Per-wallet failures are counted, never propagated.
    pub async fn claim_all(&self, distribution_id: &str) -> EngineResult<ClaimSweep> {
        let distribution = self
            .store
            .fetch_distribution(distribution_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("distribution {distribution_id}")))?;

        let mut wallets = Vec::new();
        if distribution.primary_lamports > 0 {
            wallets.push(distribution.primary_wallet.clone());
        }
        for allocation in self.store.fetch_allocations(distribution_id).await? {
            if allocation.amount_lamports > 0 {
                wallets.push(allocation.wallet);
            }
        }

        let mut sweep = ClaimSweep::default();
        for chunk in wallets.chunks(CLAIM_SWEEP_PARALLELISM) {
            let results = futures::future::join_all(
                chunk.iter().map(|wallet| self.claim(distribution_id, wallet)),
            )
            .await;
            for (wallet, result) in chunk.iter().zip(results) {
                match result {
                    Ok(ClaimOutcome::Paid { .. }) => sweep.paid += 1,
                    Ok(ClaimOutcome::AlreadyPaid { .. }) => sweep.already_paid += 1,
                    Err(e) => {
                        warn!(distribution = %distribution_id, wallet, error = %e, "claim failed in sweep");
                        sweep.failed += 1;
                    }
                }
            }
        }
        info!(
            distribution = %distribution_id,
            paid = sweep.paid,
            already_paid = sweep.already_paid,
            failed = sweep.failed,
            "claim sweep finished"
        );
        Ok(sweep)
    }

    /// Acquire phase with TTL reaping. `Ok(None)` means this call owns a
    /// fresh unsigned row; `Ok(Some(sig))` means the claim was already
    /// finalized.
    async fn acquire_claim_row(
        &self,
        distribution_id: &str,
        wallet: &str,
        amount: u64,
        now: i64,
    ) -> EngineResult<Option<String>> {
        let row = Claim {
            distribution_id: distribution_id.to_string(),
            wallet: wallet.to_string(),
            amount_lamports: amount,
            claimed_at_unix: now,
            tx_sig: None,
        };

        for attempt in 0..2 {
            match self.store.insert_claim_if_absent(&row).await? {
                ClaimAcquire::Inserted => return Ok(None),
                ClaimAcquire::Existing(existing) => {
                    if let Some(tx_sig) = existing.tx_sig {
                        return Ok(Some(tx_sig));
                    }
                    let age = now - existing.claimed_at_unix;
                    if age < self.config.claim_ttl_seconds || attempt == 1 {
                        return Err(EngineError::ClaimInFlight {
                            distribution_id: distribution_id.to_string(),
                            wallet: wallet.to_string(),
                        });
                    }
                    // Abandoned: reap and re-acquire once.
                    debug!(
                        distribution = %distribution_id,
                        wallet,
                        age,
                        "reaping abandoned unsigned claim"
                    );
                    self.store
                        .delete_unsigned_claim(distribution_id, wallet)
                        .await?;
                }
            }
        }
        Err(EngineError::ClaimInFlight {
            distribution_id: distribution_id.to_string(),
            wallet: wallet.to_string(),
        })
    }

    /// The wallet's share: the primary slot or its allocation row.
    async fn share_of(&self, distribution: &Distribution, wallet: &str) -> EngineResult<u64> {
        if wallet == distribution.primary_wallet {
            if distribution.primary_lamports == 0 {
                return Err(EngineError::Validation(format!(
                    "{wallet} has a zero primary share"
                )));
            }
            return Ok(distribution.primary_lamports);
        }
        let allocation = self
            .store
            .fetch_allocations(&distribution.id)
            .await?
            .into_iter()
            .find(|a| a.wallet == wallet)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "{wallet} holds no share of distribution {}",
                    distribution.id
                ))
            })?;
        if allocation.amount_lamports == 0 {
            return Err(EngineError::Validation(format!(
                "{wallet} has a zero allocation"
            )));
        }
        Ok(allocation.amount_lamports)
    }

    /// The owner's finalized vote-reward claim is what releases the
    /// milestone: payout confirmed first, then the state change.
    async fn owner_claim_hook(
        &self,
        distribution: &Distribution,
        tx_sig: &str,
        now: i64,
    ) -> EngineResult<()> {
        let milestone_id = distribution.milestone_id.as_deref().ok_or_else(|| {
            EngineError::Invariant(format!(
                "vote reward distribution {} has no milestone",
                distribution.id
            ))
        })?;
        let released = self
            .store
            .mark_milestone_released(milestone_id, now, Some(tx_sig))
            .await?;
        if !released {
            // A previous finalize already released it.
            return Ok(());
        }
        info!(milestone = %milestone_id, %tx_sig, "milestone released");

        let unlocked = self
            .store
            .add_unlocked(&distribution.commitment_id, distribution.pot_lamports, now)
            .await?;
        if !unlocked {
            warn!(
                commitment = %distribution.commitment_id,
                pot = distribution.pot_lamports,
                "unlock accounting skipped: would exceed recognized funding"
            );
        }

        let milestones = self
            .store
            .fetch_milestones(&distribution.commitment_id)
            .await?;
        let all_released = !milestones.is_empty()
            && milestones
                .iter()
                .all(|m| m.status == MilestoneStatus::Released);
        if all_released {
            let completed = self
                .store
                .transition_commitment(
                    &distribution.commitment_id,
                    &[CommitmentStatus::Active],
                    CommitmentStatus::Completed,
                    now,
                )
                .await?;
            if completed {
                info!(commitment = %distribution.commitment_id, "all milestones released, commitment completed");
            }
        }
        Ok(())
    }

    /// `open → completed` once every expected wallet has a finalized claim.
    async fn maybe_complete_distribution(&self, distribution: &Distribution) -> EngineResult<()> {
        let mut expected = Vec::new();
        if distribution.primary_lamports > 0 {
            expected.push(distribution.primary_wallet.clone());
        }
        for allocation in self.store.fetch_allocations(&distribution.id).await? {
            if allocation.amount_lamports > 0 {
                expected.push(allocation.wallet);
            }
        }

        let claims = self.store.fetch_claims(&distribution.id).await?;
        let all_signed = expected.iter().all(|wallet| {
            claims
                .iter()
                .any(|c| &c.wallet == wallet && c.tx_sig.is_some())
        });
        if all_signed {
            let completed = self.store.complete_distribution(&distribution.id).await?;
            if completed {
                info!(distribution = %distribution.id, "distribution completed");
            }
        }
        Ok(())
    }
}
