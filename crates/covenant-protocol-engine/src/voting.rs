//! Vote intake: signature-authorized, window-validated, first vote wins.

use crate::{EngineConfig, EngineError, EngineResult};
use covenant_protocol_chain::ChainClient;
use covenant_protocol_core::{
    tally, vote_window, Commitment, CommitmentKind, Vote, VoteSignal, VoteTally,
};
use covenant_protocol_store::CommitmentStore;
use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Result of a vote submission. `AlreadyVoted` is an idempotent no-op, not
/// an error; the stored first vote stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    AlreadyVoted,
}

pub struct VotingService {
    store: Arc<dyn CommitmentStore>,
    chain: Arc<dyn ChainClient>,
    config: EngineConfig,
}

impl VotingService {
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

    /// Record a signed vote. Milestone votes require a completed milestone
    /// with an open window; commitment-level votes require a personal
    /// commitment inside its pre-deadline window.
    pub async fn record_vote(
        &self,
        commitment_id: &str,
        milestone_id: Option<&str>,
        wallet: &str,
        vote: Vote,
        weight_usd: Decimal,
        signature: &Signature,
    ) -> EngineResult<VoteOutcome> {
        let voter = Pubkey::from_str(wallet)
            .map_err(|_| EngineError::Validation(format!("invalid voter wallet {wallet}")))?;
        if weight_usd < Decimal::ZERO {
            return Err(EngineError::Validation(
                "vote weight must be non-negative".to_string(),
            ));
        }

        let message = format!(
            "vote:{commitment_id}:{}:{vote}",
            milestone_id.unwrap_or_default()
        );
        if !self
            .chain
            .verify_signature(message.as_bytes(), signature, &voter)
        {
            return Err(EngineError::Authorization(
                "vote signature does not verify against the voter wallet".to_string(),
            ));
        }

        let commitment = self
            .store
            .fetch_commitment(commitment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("commitment {commitment_id}")))?;
        let now = self.chain.current_unix_time().await?;
        let (start, end) = self.window_for(&commitment, milestone_id).await?;
        if now < start || now >= end {
            return Err(EngineError::Validation(format!(
                "vote window [{start}, {end}) is not open at {now}"
            )));
        }

        let signal = VoteSignal {
            commitment_id: commitment_id.to_string(),
            milestone_id: milestone_id.map(str::to_string),
            signer_wallet: wallet.to_string(),
            vote,
            weight_usd,
            created_at_unix: now,
        };
        if self.store.insert_vote_if_absent(&signal).await? {
            info!(
                commitment = %commitment_id,
                milestone = milestone_id.unwrap_or("-"),
                wallet,
                %vote,
                "vote recorded"
            );
            Ok(VoteOutcome::Recorded)
        } else {
            Ok(VoteOutcome::AlreadyVoted)
        }
    }

    /// Windowed approve/reject counts. Zero tally when no window exists
    /// yet.
    pub async fn tallies(
        &self,
        commitment_id: &str,
        milestone_id: Option<&str>,
    ) -> EngineResult<VoteTally> {
        let commitment = self
            .store
            .fetch_commitment(commitment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("commitment {commitment_id}")))?;
        let window = match self.window_for(&commitment, milestone_id).await {
            Ok(window) => window,
            Err(EngineError::Validation(_)) => return Ok(VoteTally::default()),
            Err(e) => return Err(e),
        };
        let votes = self.store.fetch_votes(commitment_id, milestone_id).await?;
        Ok(tally(&votes, window))
    }

    async fn window_for(
        &self,
        commitment: &Commitment,
        milestone_id: Option<&str>,
    ) -> EngineResult<(i64, i64)> {
        match milestone_id {
            Some(milestone_id) => {
                let milestone = self
                    .store
                    .fetch_milestone(milestone_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("milestone {milestone_id}")))?;
                if milestone.commitment_id != commitment.id {
                    return Err(EngineError::Validation(format!(
                        "milestone {milestone_id} does not belong to commitment {}",
                        commitment.id
                    )));
                }
                vote_window(&milestone, self.config.cutoff_seconds).ok_or_else(|| {
                    EngineError::Validation(format!(
                        "milestone {milestone_id} is not completed, no vote window"
                    ))
                })
            }
            None => {
                if commitment.kind != CommitmentKind::Personal {
                    return Err(EngineError::Validation(
                        "commitment-level votes apply to personal commitments only".to_string(),
                    ));
                }
                let deadline = commitment.deadline_unix.ok_or_else(|| {
                    EngineError::Invariant(format!(
                        "personal commitment {} has no deadline",
                        commitment.id
                    ))
                })?;
                Ok((deadline - self.config.cutoff_seconds, deadline))
            }
        }
    }
}
