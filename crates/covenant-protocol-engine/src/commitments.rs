//! Commitment lifecycle service: issuance, activation, funding, milestone
//! management, and the lazy read path that advances milestone state on
//! every load.

use crate::{EngineConfig, EngineError, EngineResult};
use covenant_protocol_chain::ChainClient;
use covenant_protocol_core::{
    advance, new_id, tally, vote_window, Commitment, CommitmentKind, CommitmentStatus, Milestone,
    MilestoneStatus, SignerRef, VoteTally,
};
use covenant_protocol_store::CommitmentStore;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for [`CommitmentService::add_milestone`]. Exactly one of
/// `unlock_lamports` / `unlock_percent` must be set.
#[derive(Debug, Clone)]
pub struct MilestoneSpec {
    pub description: String,
    pub unlock_lamports: Option<u64>,
    pub unlock_percent: Option<u8>,
    pub due_at_unix: Option<i64>,
}

/// A commitment with its milestones, after lazy advancement.
#[derive(Debug, Clone)]
pub struct CommitmentView {
    pub commitment: Commitment,
    pub milestones: Vec<Milestone>,
}

pub struct CommitmentService {
    store: Arc<dyn CommitmentStore>,
    chain: Arc<dyn ChainClient>,
    config: EngineConfig,
}

impl CommitmentService {
    pub fn new(
        store: Arc<dyn CommitmentStore>,
        chain: Arc<dyn ChainClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            chain,
            config,
        }
    }

    /// Issue a personal commitment: fixed amount, hard deadline.
    pub async fn issue_personal(
        &self,
        owner_wallet: Pubkey,
        escrow_pubkey: Pubkey,
        signer_ref: SignerRef,
        amount_lamports: u64,
        deadline_unix: i64,
    ) -> EngineResult<Commitment> {
        if amount_lamports == 0 {
            return Err(EngineError::Validation(
                "commitment amount must be positive".to_string(),
            ));
        }
        let now = self.chain.current_unix_time().await?;
        if deadline_unix <= now {
            return Err(EngineError::Validation(format!(
                "deadline {deadline_unix} is not in the future (now {now})"
            )));
        }

        let commitment = Commitment {
            id: new_id(),
            kind: CommitmentKind::Personal,
            owner_wallet,
            escrow_pubkey,
            signer_ref,
            status: CommitmentStatus::Created,
            prior_status: None,
            amount_lamports: Some(amount_lamports),
            deadline_unix: Some(deadline_unix),
            total_funded_lamports: amount_lamports,
            unlocked_lamports: 0,
            resolved_tx_sig: None,
            created_at_unix: now,
            updated_at_unix: now,
        };
        self.store.insert_commitment(&commitment).await?;
        info!(
            commitment = %commitment.id,
            owner = %owner_wallet,
            amount_lamports,
            deadline_unix,
            "issued personal commitment"
        );
        Ok(commitment)
    }

    /// Issue a creator reward commitment: open-ended funding, milestones
    /// added over time.
    pub async fn issue_reward(
        &self,
        owner_wallet: Pubkey,
        escrow_pubkey: Pubkey,
        signer_ref: SignerRef,
    ) -> EngineResult<Commitment> {
        let now = self.chain.current_unix_time().await?;
        let commitment = Commitment {
            id: new_id(),
            kind: CommitmentKind::CreatorReward,
            owner_wallet,
            escrow_pubkey,
            signer_ref,
            status: CommitmentStatus::Created,
            prior_status: None,
            amount_lamports: None,
            deadline_unix: None,
            total_funded_lamports: 0,
            unlocked_lamports: 0,
            resolved_tx_sig: None,
            created_at_unix: now,
            updated_at_unix: now,
        };
        self.store.insert_commitment(&commitment).await?;
        info!(commitment = %commitment.id, owner = %owner_wallet, "issued reward commitment");
        Ok(commitment)
    }

    /// `Created → Active`, after verifying the escrow is funded.
    pub async fn activate(&self, id: &str) -> EngineResult<Commitment> {
        let commitment = self.require_commitment(id).await?;
        let balance = self.chain.get_balance(&commitment.escrow_pubkey).await?;

        match commitment.kind {
            CommitmentKind::Personal => {
                let amount = commitment.amount_lamports.unwrap_or(0);
                if balance < amount {
                    return Err(EngineError::Validation(format!(
                        "escrow holds {balance} lamports, commitment requires {amount}"
                    )));
                }
            }
            CommitmentKind::CreatorReward => {
                if balance == 0 {
                    return Err(EngineError::Validation(
                        "escrow is unfunded".to_string(),
                    ));
                }
            }
        }

        let now = self.chain.current_unix_time().await?;
        let moved = self
            .store
            .transition_commitment(
                id,
                &[CommitmentStatus::Created],
                CommitmentStatus::Active,
                now,
            )
            .await?;
        if !moved {
            return Err(EngineError::Conflict(format!(
                "commitment {id} is not in created state"
            )));
        }
        info!(commitment = %id, balance, "commitment activated");
        self.require_commitment(id).await
    }

    /// Raise a reward commitment's recognized funding. Percent-based
    /// milestone amounts grow with it; resolution happens at evaluation
    /// time.
    pub async fn fund_reward(&self, id: &str, amount_lamports: u64) -> EngineResult<Commitment> {
        if amount_lamports == 0 {
            return Err(EngineError::Validation(
                "funding amount must be positive".to_string(),
            ));
        }
        let commitment = self.require_commitment(id).await?;
        if commitment.kind != CommitmentKind::CreatorReward {
            return Err(EngineError::Validation(
                "only reward commitments accept incremental funding".to_string(),
            ));
        }
        if !matches!(
            commitment.status,
            CommitmentStatus::Created | CommitmentStatus::Active
        ) {
            return Err(EngineError::Validation(format!(
                "commitment is {}, funding requires created or active",
                commitment.status
            )));
        }

        let new_total = commitment
            .total_funded_lamports
            .checked_add(amount_lamports)
            .ok_or_else(|| EngineError::Validation("funding overflows".to_string()))?;
        let balance = self.chain.get_balance(&commitment.escrow_pubkey).await?;
        if balance < new_total {
            return Err(EngineError::Validation(format!(
                "escrow holds {balance} lamports, cannot recognize {new_total}"
            )));
        }

        let now = self.chain.current_unix_time().await?;
        let updated = self.store.set_reward_funding(id, new_total, now).await?;
        if !updated {
            return Err(EngineError::Conflict(format!(
                "commitment {id} changed concurrently"
            )));
        }
        info!(commitment = %id, new_total, "reward funding recognized");
        self.require_commitment(id).await
    }

    /// Append a milestone at the next position. Reopens a `Completed`
    /// reward commitment.
    pub async fn add_milestone(&self, id: &str, spec: MilestoneSpec) -> EngineResult<Milestone> {
        match (spec.unlock_lamports, spec.unlock_percent) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(EngineError::Validation(
                    "exactly one of unlock_lamports and unlock_percent must be set".to_string(),
                ))
            }
        }
        if spec.unlock_lamports == Some(0) {
            return Err(EngineError::Validation(
                "unlock amount must be positive".to_string(),
            ));
        }
        if let Some(percent) = spec.unlock_percent {
            if percent == 0 || percent > 100 {
                return Err(EngineError::Validation(format!(
                    "unlock percent {percent} out of range 1..=100"
                )));
            }
        }

        let commitment = self.require_commitment(id).await?;
        if commitment.kind != CommitmentKind::CreatorReward {
            return Err(EngineError::Validation(
                "only reward commitments carry milestones".to_string(),
            ));
        }
        if !matches!(
            commitment.status,
            CommitmentStatus::Created | CommitmentStatus::Active | CommitmentStatus::Completed
        ) {
            return Err(EngineError::Validation(format!(
                "cannot add milestones to a {} commitment",
                commitment.status
            )));
        }

        let existing = self.store.fetch_milestones(id).await?;
        if let Some(percent) = spec.unlock_percent {
            let committed: u32 = existing
                .iter()
                .filter(|m| m.status != MilestoneStatus::Failed)
                .filter_map(|m| m.unlock_percent.map(u32::from))
                .sum();
            if committed + u32::from(percent) > 100 {
                return Err(EngineError::Validation(format!(
                    "unlock percents would total {} (> 100)",
                    committed + u32::from(percent)
                )));
            }
        }
        let position = existing.iter().map(|m| m.position + 1).max().unwrap_or(0);

        let milestone = Milestone {
            id: new_id(),
            commitment_id: id.to_string(),
            position,
            description: spec.description,
            unlock_lamports: spec.unlock_lamports,
            unlock_percent: spec.unlock_percent,
            status: MilestoneStatus::Locked,
            completed_at_unix: None,
            review_opened_at_unix: None,
            due_at_unix: spec.due_at_unix,
            claimable_at_unix: None,
            became_claimable_at_unix: None,
            released_at_unix: None,
            released_tx_sig: None,
        };
        self.store.insert_milestone(&milestone).await?;

        if commitment.status == CommitmentStatus::Completed {
            let now = self.chain.current_unix_time().await?;
            self.store
                .transition_commitment(
                    id,
                    &[CommitmentStatus::Completed],
                    CommitmentStatus::Active,
                    now,
                )
                .await?;
            info!(commitment = %id, "completed commitment reopened by new milestone");
        }

        info!(commitment = %id, milestone = %milestone.id, position, "milestone added");
        Ok(milestone)
    }

    /// Creator-signed milestone completion. `early_review` opens the vote
    /// window immediately instead of waiting for `due_at`.
    pub async fn complete_milestone(
        &self,
        commitment_id: &str,
        milestone_id: &str,
        early_review: bool,
        signature: &Signature,
    ) -> EngineResult<Milestone> {
        let commitment = self.require_commitment(commitment_id).await?;
        let message = format!("complete:{commitment_id}:{milestone_id}");
        if !self
            .chain
            .verify_signature(message.as_bytes(), signature, &commitment.owner_wallet)
        {
            return Err(EngineError::Authorization(
                "completion must be signed by the commitment owner".to_string(),
            ));
        }

        let milestone = self.require_milestone(commitment_id, milestone_id).await?;
        if milestone.status != MilestoneStatus::Locked || milestone.completed_at_unix.is_some() {
            return Err(EngineError::Conflict(format!(
                "milestone {milestone_id} is already completed or past review"
            )));
        }

        let now = self.chain.current_unix_time().await?;
        let review_opened_at = early_review.then_some(now);
        let claimable_at = now + self.config.claim_delay_seconds;
        let stamped = self
            .store
            .set_milestone_completed(milestone_id, now, review_opened_at, claimable_at)
            .await?;
        if !stamped {
            return Err(EngineError::Conflict(format!(
                "milestone {milestone_id} was completed concurrently"
            )));
        }
        info!(
            commitment = %commitment_id,
            milestone = %milestone_id,
            early_review,
            "milestone completed"
        );
        self.require_milestone(commitment_id, milestone_id).await
    }

    /// Fetch a commitment and lazily advance its milestones. Safe to call
    /// repeatedly and concurrently; every persisted transition is guarded
    /// on its `from_status`.
    pub async fn load(&self, id: &str) -> EngineResult<CommitmentView> {
        let commitment = self.require_commitment(id).await?;
        let now = self.chain.current_unix_time().await?;
        let advance_config = self.config.advance_config();

        let mut milestones = self.store.fetch_milestones(id).await?;
        for milestone in &mut milestones {
            if milestone.status.is_terminal() {
                continue;
            }
            let milestone_tally = self.windowed_tally(id, milestone).await?;
            if let Some(patch) = advance(milestone, &milestone_tally, now, &advance_config) {
                let applied = self.store.apply_milestone_advance(&milestone.id, &patch).await?;
                if applied {
                    debug!(
                        milestone = %milestone.id,
                        from = %patch.from_status,
                        to = %patch.to_status,
                        "lazy milestone advance"
                    );
                    milestone.status = patch.to_status;
                    if patch.became_claimable_at_unix.is_some() {
                        milestone.became_claimable_at_unix = patch.became_claimable_at_unix;
                    }
                } else if let Some(stored) = self.store.fetch_milestone(&milestone.id).await? {
                    // Another reader advanced it first.
                    *milestone = stored;
                }
            }
        }

        let mut commitment = commitment;
        let all_released = !milestones.is_empty()
            && milestones
                .iter()
                .all(|m| m.status == MilestoneStatus::Released);
        if all_released && commitment.status == CommitmentStatus::Active {
            let moved = self
                .store
                .transition_commitment(
                    id,
                    &[CommitmentStatus::Active],
                    CommitmentStatus::Completed,
                    now,
                )
                .await?;
            if moved {
                info!(commitment = %id, "all milestones released, commitment completed");
                commitment.status = CommitmentStatus::Completed;
            }
        }

        Ok(CommitmentView {
            commitment,
            milestones,
        })
    }

    /// Load every commitment, advancing each the way [`Self::load`] does.
    pub async fn load_all(&self) -> EngineResult<Vec<CommitmentView>> {
        let commitments = self.store.list_commitments().await?;
        let mut views = Vec::with_capacity(commitments.len());
        for commitment in commitments {
            views.push(self.load(&commitment.id).await?);
        }
        Ok(views)
    }

    /// Move a terminal commitment to `Archived`. Rows are retained for
    /// audit, never deleted.
    pub async fn archive(&self, id: &str) -> EngineResult<()> {
        let now = self.chain.current_unix_time().await?;
        let moved = self
            .store
            .transition_commitment(
                id,
                &[
                    CommitmentStatus::ResolvedSuccess,
                    CommitmentStatus::ResolvedFailure,
                    CommitmentStatus::Completed,
                    CommitmentStatus::Failed,
                ],
                CommitmentStatus::Archived,
                now,
            )
            .await?;
        if !moved {
            let commitment = self.require_commitment(id).await?;
            return Err(EngineError::Validation(format!(
                "commitment is {}, only terminal commitments archive",
                commitment.status
            )));
        }
        info!(commitment = %id, "commitment archived");
        Ok(())
    }

    /// Manual recovery after a crash mid-resolution: restore the status the
    /// resolving lock replaced.
    pub async fn force_unstick(&self, id: &str) -> EngineResult<Commitment> {
        let now = self.chain.current_unix_time().await?;
        let released = self.store.release_resolving(id, now).await?;
        if !released {
            return Err(EngineError::Conflict(format!(
                "commitment {id} is not resolving"
            )));
        }
        warn!(commitment = %id, "resolving lock force-released");
        self.require_commitment(id).await
    }

    pub(crate) async fn require_commitment(&self, id: &str) -> EngineResult<Commitment> {
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

    async fn windowed_tally(
        &self,
        commitment_id: &str,
        milestone: &Milestone,
    ) -> EngineResult<VoteTally> {
        let Some(window) = vote_window(milestone, self.config.cutoff_seconds) else {
            return Ok(VoteTally::default());
        };
        let votes = self
            .store
            .fetch_votes(commitment_id, Some(&milestone.id))
            .await?;
        Ok(tally(&votes, window))
    }
}
