//! Settlement: turning terminal outcomes into distributions and, for
//! personal commitments, moving the escrow itself.
//!
//! Distribution parameters are recomputed purely from stored snapshots
//! (captured vote weights, recognized funding), so a retried settlement
//! derives byte-identical parameters. The `create_distribution_if_absent`
//! insert is the idempotency point; a parameter mismatch against the stored
//! row is a hard error, never silently reconciled.

use crate::{EngineConfig, EngineError, EngineResult};
use covenant_protocol_chain::{ChainClient, ChainError, SecretVault};
use covenant_protocol_core::{
    new_id, split_pot, tally, Allocation, Commitment, CommitmentKind, CommitmentStatus,
    Distribution, DistributionKind, DistributionStatus, Milestone, MilestoneStatus, Recipient,
    SplitStrategy, VoteSignal,
};
use covenant_protocol_store::{CommitmentStore, CreateDistribution};
use rust_decimal::{Decimal, MathematicalOps};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of resolving a personal commitment at its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Approved: escrow paid out to the owner.
    Success { tx_sig: String },
    /// Rejected: escrow split into a failure distribution; claims pay out
    /// lock-free afterwards.
    Failure { distribution_id: String },
}

pub struct SettlementEngine {
    store: Arc<dyn CommitmentStore>,
    chain: Arc<dyn ChainClient>,
    vault: Arc<SecretVault>,
    config: EngineConfig,
}

impl SettlementEngine {
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

    /// Resolve a personal commitment after its deadline. Approval sends the
    /// escrow to the owner under the resolving lock; rejection builds the
    /// failure distribution.
    pub async fn resolve_personal(&self, id: &str) -> EngineResult<Resolution> {
        let commitment = self.require_commitment(id).await?;
        if commitment.kind != CommitmentKind::Personal {
            return Err(EngineError::Validation(
                "only personal commitments resolve at a deadline".to_string(),
            ));
        }
        if commitment.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "commitment {id} is already {}",
                commitment.status
            )));
        }
        let deadline = commitment.deadline_unix.ok_or_else(|| {
            EngineError::Invariant(format!("personal commitment {id} has no deadline"))
        })?;
        let now = self.chain.current_unix_time().await?;
        if now < deadline {
            return Err(EngineError::Validation(format!(
                "deadline {deadline} not reached at {now}"
            )));
        }

        let votes = self.store.fetch_votes(id, None).await?;
        let window = (deadline - self.config.cutoff_seconds, deadline);
        let verdict = tally(&votes, window);
        let approved = verdict.passes(self.config.approval_threshold);

        if !self.store.acquire_resolving(id, now).await? {
            return Err(EngineError::AlreadyResolving(id.to_string()));
        }

        let result = if approved {
            self.payout_owner(&commitment, now).await
        } else {
            self.settle_failure(&commitment, &votes, now).await
        };
        match &result {
            Ok(resolution) => info!(commitment = %id, ?resolution, "personal commitment resolved"),
            Err(e) => warn!(commitment = %id, error = %e, "resolution failed"),
        }
        result
    }

    /// Approved path: full escrow balance to the owner, then
    /// `resolving → resolved_success`.
    async fn payout_owner(&self, commitment: &Commitment, now: i64) -> EngineResult<Resolution> {
        let id = &commitment.id;
        let balance = match self.chain.get_balance(&commitment.escrow_pubkey).await {
            Ok(balance) => balance,
            Err(e) => {
                self.store.release_resolving(id, now).await?;
                return Err(e.into());
            }
        };
        let signer = match self
            .vault
            .resolve_signer(&commitment.signer_ref, &commitment.escrow_pubkey)
        {
            Ok(signer) => signer,
            Err(e) => {
                self.store.release_resolving(id, now).await?;
                return Err(e.into());
            }
        };

        let tx_sig = match self
            .chain
            .transfer(&signer, &commitment.owner_wallet, balance)
            .await
        {
            Ok(signature) => signature.to_string(),
            Err(e @ ChainError::TransferTimeout { .. }) => {
                // The transfer may have landed; keep the lock so nothing
                // re-spends the escrow. force_unstick is the manual path.
                warn!(commitment = %id, "resolution transfer timed out, lock held");
                return Err(e.into());
            }
            Err(e) => {
                self.store.release_resolving(id, now).await?;
                return Err(e.into());
            }
        };

        let finished = self
            .store
            .finish_resolving(id, CommitmentStatus::ResolvedSuccess, Some(&tx_sig), now)
            .await?;
        if !finished {
            return Err(EngineError::Invariant(format!(
                "resolving lock for {id} vanished before finish"
            )));
        }
        Ok(Resolution::Success { tx_sig })
    }

    /// Rejected path: split the live escrow balance between the treasury
    /// and the commitment's voters, then `resolving → resolved_failure`.
    async fn settle_failure(
        &self,
        commitment: &Commitment,
        votes: &[VoteSignal],
        now: i64,
    ) -> EngineResult<Resolution> {
        let id = &commitment.id;
        let pot = match self.chain.get_balance(&commitment.escrow_pubkey).await {
            Ok(balance) => balance,
            Err(e) => {
                self.store.release_resolving(id, now).await?;
                return Err(e.into());
            }
        };

        let recipients = linear_voter_recipients(votes, self.config.vote_weight_multiplier);
        let built = self.build_failure_distribution(
            DistributionKind::CommitmentFailure,
            id,
            None,
            pot,
            &recipients,
            now,
        )?;

        let distribution_id = match self.persist_distribution(&built.0, &built.1).await {
            Ok(distribution_id) => distribution_id,
            Err(e) => {
                self.store.release_resolving(id, now).await?;
                return Err(e);
            }
        };

        let finished = self
            .store
            .finish_resolving(id, CommitmentStatus::ResolvedFailure, None, now)
            .await?;
        if !finished {
            return Err(EngineError::Invariant(format!(
                "resolving lock for {id} vanished before finish"
            )));
        }
        Ok(Resolution::Failure { distribution_id })
    }

    /// Settle a milestone that failed (missed delivery or rejected vote):
    /// its unlock amount is forfeited into a failure distribution and the
    /// commitment terminates.
    pub async fn settle_milestone_failure(
        &self,
        commitment_id: &str,
        milestone_id: &str,
    ) -> EngineResult<Distribution> {
        let commitment = self.require_commitment(commitment_id).await?;
        let milestone = self.require_milestone(commitment_id, milestone_id).await?;
        if milestone.status != MilestoneStatus::Failed {
            return Err(EngineError::Validation(format!(
                "milestone {milestone_id} is {}, settlement requires failed",
                milestone.status
            )));
        }

        let now = self.chain.current_unix_time().await?;
        let pot = milestone.resolved_unlock_lamports(commitment.total_funded_lamports);
        let votes = self.store.fetch_votes(commitment_id, None).await?;
        let milestone_votes = self
            .store
            .fetch_votes(commitment_id, Some(milestone_id))
            .await?;
        let all_votes: Vec<VoteSignal> = votes.into_iter().chain(milestone_votes).collect();
        let recipients =
            linear_voter_recipients(&all_votes, self.config.vote_weight_multiplier);

        let (distribution, allocations) = self.build_failure_distribution(
            DistributionKind::MilestoneFailure,
            commitment_id,
            Some(milestone_id),
            pot,
            &recipients,
            now,
        )?;
        let distribution_id = self.persist_distribution(&distribution, &allocations).await?;

        // Forfeited funds terminate the commitment.
        self.store
            .transition_commitment(
                commitment_id,
                &[CommitmentStatus::Active],
                CommitmentStatus::Failed,
                now,
            )
            .await?;
        info!(
            commitment = %commitment_id,
            milestone = %milestone_id,
            pot,
            "milestone failure settled"
        );

        self.store
            .fetch_distribution(&distribution_id)
            .await?
            .ok_or_else(|| EngineError::Invariant(format!("distribution {distribution_id} vanished")))
    }

    /// Build the vote-reward distribution for a claimable milestone. The
    /// milestone itself flips to released only when the owner's claim for
    /// this distribution finalizes — payout confirmed first.
    pub async fn release_milestone(
        &self,
        commitment_id: &str,
        milestone_id: &str,
    ) -> EngineResult<Distribution> {
        let commitment = self.require_commitment(commitment_id).await?;
        let milestone = self.require_milestone(commitment_id, milestone_id).await?;
        if milestone.status != MilestoneStatus::Claimable {
            return Err(EngineError::Validation(format!(
                "milestone {milestone_id} is {}, release requires claimable",
                milestone.status
            )));
        }

        let now = self.chain.current_unix_time().await?;
        let pot = milestone.resolved_unlock_lamports(commitment.total_funded_lamports);
        if pot == 0 {
            return self
                .release_empty_milestone(&commitment, milestone_id, now)
                .await;
        }
        let votes = self
            .store
            .fetch_votes(commitment_id, Some(milestone_id))
            .await?;
        let recipients = sqrt_voter_recipients(&votes, self.config.vote_weight_multiplier);

        let voter_pot = if recipients.is_empty() {
            0
        } else {
            mul_bps(pot, self.config.vote_reward_bps)
        };
        let (allocations, voter_pot) = if voter_pot == 0 {
            (Vec::new(), 0)
        } else {
            let shares = split_pot(
                voter_pot,
                &recipients,
                SplitStrategy::Weighted,
                self.config.dust_lamports,
            )?;
            (shares, voter_pot)
        };

        let distribution = Distribution {
            id: new_id(),
            kind: DistributionKind::VoteReward,
            commitment_id: commitment_id.to_string(),
            milestone_id: Some(milestone_id.to_string()),
            settlement_key: DistributionKind::VoteReward
                .settlement_key(commitment_id, Some(milestone_id)),
            pot_lamports: pot,
            primary_wallet: commitment.owner_wallet.to_string(),
            primary_lamports: pot - voter_pot,
            voter_pot_lamports: voter_pot,
            allocation_count: allocations.len() as u32,
            status: DistributionStatus::Open,
            created_at_unix: now,
        };
        let allocations: Vec<Allocation> = allocations
            .into_iter()
            .map(|share| Allocation {
                distribution_id: distribution.id.clone(),
                wallet: share.wallet,
                amount_lamports: share.amount_lamports,
                weight: share.weight,
            })
            .collect();

        let distribution_id = self.persist_distribution(&distribution, &allocations).await?;
        info!(
            commitment = %commitment_id,
            milestone = %milestone_id,
            pot,
            voter_pot,
            "vote reward distribution ready"
        );
        self.store
            .fetch_distribution(&distribution_id)
            .await?
            .ok_or_else(|| EngineError::Invariant(format!("distribution {distribution_id} vanished")))
    }

    /// A milestone whose resolved unlock is zero has nothing to transfer:
    /// the distribution records the empty split as already completed and
    /// the milestone releases immediately, no claim required.
    async fn release_empty_milestone(
        &self,
        commitment: &Commitment,
        milestone_id: &str,
        now: i64,
    ) -> EngineResult<Distribution> {
        let distribution = Distribution {
            id: new_id(),
            kind: DistributionKind::VoteReward,
            commitment_id: commitment.id.clone(),
            milestone_id: Some(milestone_id.to_string()),
            settlement_key: DistributionKind::VoteReward
                .settlement_key(&commitment.id, Some(milestone_id)),
            pot_lamports: 0,
            primary_wallet: commitment.owner_wallet.to_string(),
            primary_lamports: 0,
            voter_pot_lamports: 0,
            allocation_count: 0,
            status: DistributionStatus::Completed,
            created_at_unix: now,
        };
        let distribution_id = self.persist_distribution(&distribution, &[]).await?;

        let released = self
            .store
            .mark_milestone_released(milestone_id, now, None)
            .await?;
        if released {
            info!(
                commitment = %commitment.id,
                milestone = %milestone_id,
                "zero-pot milestone released"
            );
            self.complete_if_all_released(&commitment.id, now).await?;
        }
        self.store
            .fetch_distribution(&distribution_id)
            .await?
            .ok_or_else(|| EngineError::Invariant(format!("distribution {distribution_id} vanished")))
    }

    async fn complete_if_all_released(&self, commitment_id: &str, now: i64) -> EngineResult<()> {
        let milestones = self.store.fetch_milestones(commitment_id).await?;
        let all_released = !milestones.is_empty()
            && milestones
                .iter()
                .all(|m| m.status == MilestoneStatus::Released);
        if all_released {
            let completed = self
                .store
                .transition_commitment(
                    commitment_id,
                    &[CommitmentStatus::Active],
                    CommitmentStatus::Completed,
                    now,
                )
                .await?;
            if completed {
                info!(commitment = %commitment_id, "all milestones released, commitment completed");
            }
        }
        Ok(())
    }

    /// Failure split: `buyback_bps` of the pot to the treasury, the rest
    /// linearly across the voter snapshot. An empty snapshot folds the
    /// voter pot into the treasury share.
    fn build_failure_distribution(
        &self,
        kind: DistributionKind,
        commitment_id: &str,
        milestone_id: Option<&str>,
        pot: u64,
        recipients: &[Recipient],
        now: i64,
    ) -> EngineResult<(Distribution, Vec<Allocation>)> {
        let mut treasury_cut = mul_bps(pot, self.config.buyback_bps);
        let mut voter_pot = pot - treasury_cut;
        let shares = if recipients.is_empty() || voter_pot == 0 {
            treasury_cut += voter_pot;
            voter_pot = 0;
            Vec::new()
        } else {
            split_pot(
                voter_pot,
                recipients,
                SplitStrategy::Weighted,
                self.config.dust_lamports,
            )?
        };

        let distribution = Distribution {
            id: new_id(),
            kind,
            commitment_id: commitment_id.to_string(),
            milestone_id: milestone_id.map(str::to_string),
            settlement_key: kind.settlement_key(commitment_id, milestone_id),
            pot_lamports: pot,
            primary_wallet: self.config.treasury_wallet.clone(),
            primary_lamports: treasury_cut,
            voter_pot_lamports: voter_pot,
            allocation_count: shares.len() as u32,
            status: DistributionStatus::Open,
            created_at_unix: now,
        };
        let allocations = shares
            .into_iter()
            .map(|share| Allocation {
                distribution_id: distribution.id.clone(),
                wallet: share.wallet,
                amount_lamports: share.amount_lamports,
                weight: share.weight,
            })
            .collect();
        Ok((distribution, allocations))
    }

    /// Create-if-absent, then the exhaustive stored-vs-recomputed check on
    /// a retry.
    async fn persist_distribution(
        &self,
        distribution: &Distribution,
        allocations: &[Allocation],
    ) -> EngineResult<String> {
        match self
            .store
            .create_distribution_if_absent(distribution, allocations)
            .await?
        {
            CreateDistribution::Created => Ok(distribution.id.clone()),
            CreateDistribution::Existing(stored) => {
                if stored.params_match(distribution) {
                    Ok(stored.id)
                } else {
                    warn!(
                        settlement_key = %distribution.settlement_key,
                        "stored distribution disagrees with recomputation"
                    );
                    Err(EngineError::DistributionMismatch {
                        settlement_key: distribution.settlement_key.clone(),
                    })
                }
            }
        }
    }

    async fn require_commitment(&self, id: &str) -> EngineResult<Commitment> {
        self.store
            .fetch_commitment(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("commitment {id}")))
    }

    async fn require_milestone(
        &self,
        commitment_id: &str,
        milestone_id: &str,
    ) -> EngineResult<Milestone> {
        let milestone = self
            .store
            .fetch_milestone(milestone_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("milestone {milestone_id}")))?;
        if milestone.commitment_id != commitment_id {
            return Err(EngineError::Validation(format!(
                "milestone {milestone_id} does not belong to commitment {commitment_id}"
            )));
        }
        Ok(milestone)
    }
}

fn mul_bps(amount: u64, bps: u64) -> u64 {
    (amount as u128 * bps as u128 / 10_000) as u64
}

/// Distinct voters with linear aggregate weight, ordered by wallet so the
/// recomputation is independent of fetch order.
fn linear_voter_recipients(votes: &[VoteSignal], multiplier: u32) -> Vec<Recipient> {
    aggregate_weights(votes, multiplier)
        .into_iter()
        .map(|(wallet, weight)| Recipient { wallet, weight })
        .collect()
}

/// Distinct voters with √-compressed aggregate weight.
fn sqrt_voter_recipients(votes: &[VoteSignal], multiplier: u32) -> Vec<Recipient> {
    aggregate_weights(votes, multiplier)
        .into_iter()
        .filter_map(|(wallet, weight)| {
            if weight <= Decimal::ZERO {
                return None;
            }
            weight.sqrt().map(|root| Recipient {
                wallet,
                weight: root,
            })
        })
        .collect()
}

fn aggregate_weights(votes: &[VoteSignal], multiplier: u32) -> BTreeMap<String, Decimal> {
    let multiplier = Decimal::from(multiplier);
    let mut weights: BTreeMap<String, Decimal> = BTreeMap::new();
    for vote in votes {
        *weights.entry(vote.signer_wallet.clone()).or_default() += vote.weight_usd * multiplier;
    }
    weights
}
