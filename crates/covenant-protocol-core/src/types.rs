use crate::{CoreError, CoreResult};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

/// What a commitment escrows funds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentKind {
    /// A single deadline-bound pledge by one owner.
    Personal,
    /// A milestone-gated reward pool funded for a creator.
    CreatorReward,
}

impl CommitmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentKind::Personal => "personal",
            CommitmentKind::CreatorReward => "creator_reward",
        }
    }
}

impl fmt::Display for CommitmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitmentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "personal" => Ok(CommitmentKind::Personal),
            "creator_reward" => Ok(CommitmentKind::CreatorReward),
            other => Err(CoreError::parse("commitment kind", other)),
        }
    }
}

/// Commitment lifecycle states.
///
/// Personal: `Created/Active → Resolving → ResolvedSuccess | ResolvedFailure`.
/// Reward: `Active ↔ Completed` (re-opens when a milestone is added after
/// completion), terminal `Failed` once a milestone fails forfeiting funds.
/// `Archived` is reachable only from terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    Created,
    Active,
    Resolving,
    ResolvedSuccess,
    ResolvedFailure,
    Completed,
    Failed,
    Archived,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentStatus::Created => "created",
            CommitmentStatus::Active => "active",
            CommitmentStatus::Resolving => "resolving",
            CommitmentStatus::ResolvedSuccess => "resolved_success",
            CommitmentStatus::ResolvedFailure => "resolved_failure",
            CommitmentStatus::Completed => "completed",
            CommitmentStatus::Failed => "failed",
            CommitmentStatus::Archived => "archived",
        }
    }

    /// Terminal states are retained for audit and never transition again,
    /// except `Completed → Active` when a reward commitment gains a new
    /// milestone, and any terminal state moving to `Archived`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommitmentStatus::ResolvedSuccess
                | CommitmentStatus::ResolvedFailure
                | CommitmentStatus::Completed
                | CommitmentStatus::Failed
                | CommitmentStatus::Archived
        )
    }

    /// Only these states may claim the resolving lock.
    pub fn can_enter_resolving(&self) -> bool {
        matches!(self, CommitmentStatus::Created | CommitmentStatus::Active)
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "created" => Ok(CommitmentStatus::Created),
            "active" => Ok(CommitmentStatus::Active),
            "resolving" => Ok(CommitmentStatus::Resolving),
            "resolved_success" => Ok(CommitmentStatus::ResolvedSuccess),
            "resolved_failure" => Ok(CommitmentStatus::ResolvedFailure),
            "completed" => Ok(CommitmentStatus::Completed),
            "failed" => Ok(CommitmentStatus::Failed),
            "archived" => Ok(CommitmentStatus::Archived),
            other => Err(CoreError::parse("commitment status", other)),
        }
    }
}

/// Milestone lifecycle states. Transitions may only increase `rank()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneStatus {
    Locked,
    Approved,
    Claimable,
    Released,
    Failed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Locked => "locked",
            MilestoneStatus::Approved => "approved",
            MilestoneStatus::Claimable => "claimable",
            MilestoneStatus::Released => "released",
            MilestoneStatus::Failed => "failed",
        }
    }

    /// Strict forward order. `Released` and `Failed` share the top rank:
    /// both are terminal and unreachable from each other.
    pub fn rank(&self) -> u8 {
        match self {
            MilestoneStatus::Locked => 0,
            MilestoneStatus::Approved => 1,
            MilestoneStatus::Claimable => 2,
            MilestoneStatus::Released => 3,
            MilestoneStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MilestoneStatus::Released | MilestoneStatus::Failed)
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "locked" => Ok(MilestoneStatus::Locked),
            "approved" => Ok(MilestoneStatus::Approved),
            "claimable" => Ok(MilestoneStatus::Claimable),
            "released" => Ok(MilestoneStatus::Released),
            "failed" => Ok(MilestoneStatus::Failed),
            other => Err(CoreError::parse("milestone status", other)),
        }
    }
}

/// Signing authority over an escrow: either encrypted local key material or
/// a reference to a custodial wallet. The tag is decided when the value is
/// constructed or deserialized — business logic never sniffs payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerRef {
    Local { ciphertext: Vec<u8> },
    Custodial { wallet_id: String },
}

impl SignerRef {
    pub fn kind(&self) -> &'static str {
        match self {
            SignerRef::Local { .. } => "local",
            SignerRef::Custodial { .. } => "custodial",
        }
    }

    /// Storage encoding: local ciphertext is hex, custodial payload is the
    /// wallet id verbatim.
    pub fn payload(&self) -> String {
        match self {
            SignerRef::Local { ciphertext } => hex::encode(ciphertext),
            SignerRef::Custodial { wallet_id } => wallet_id.clone(),
        }
    }

    pub fn from_columns(kind: &str, payload: &str) -> CoreResult<Self> {
        match kind {
            "local" => {
                let ciphertext = hex::decode(payload)
                    .map_err(|_| CoreError::parse("signer payload", payload))?;
                Ok(SignerRef::Local { ciphertext })
            }
            "custodial" => Ok(SignerRef::Custodial {
                wallet_id: payload.to_string(),
            }),
            other => Err(CoreError::parse("signer kind", other)),
        }
    }
}

/// The central aggregate: one escrow, its signer, and its lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub struct Commitment {
    pub id: String,
    pub kind: CommitmentKind,
    pub owner_wallet: Pubkey,
    /// Owned exclusively by this commitment; never shared.
    pub escrow_pubkey: Pubkey,
    pub signer_ref: SignerRef,
    pub status: CommitmentStatus,
    /// Set while the resolving lock is held so release can restore it.
    pub prior_status: Option<CommitmentStatus>,
    /// Personal commitments only.
    pub amount_lamports: Option<u64>,
    /// Personal commitments only.
    pub deadline_unix: Option<i64>,
    /// Reward commitments: funding may grow over the lifetime.
    pub total_funded_lamports: u64,
    /// Reward commitments: Σ unlock of released milestones.
    pub unlocked_lamports: u64,
    pub resolved_tx_sig: Option<String>,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
}

/// A milestone owned 1:N by a reward commitment, ordered by `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Milestone {
    pub id: String,
    pub commitment_id: String,
    pub position: u32,
    pub description: String,
    /// Exactly one of `unlock_lamports` / `unlock_percent` is set.
    pub unlock_lamports: Option<u64>,
    /// Resolved against `total_funded_lamports` at evaluation time, not at
    /// creation time — funding can grow.
    pub unlock_percent: Option<u8>,
    pub status: MilestoneStatus,
    pub completed_at_unix: Option<i64>,
    pub review_opened_at_unix: Option<i64>,
    pub due_at_unix: Option<i64>,
    /// Scheduled: `completed_at + claim_delay`.
    pub claimable_at_unix: Option<i64>,
    /// Actual moment the milestone became claimable.
    pub became_claimable_at_unix: Option<i64>,
    pub released_at_unix: Option<i64>,
    pub released_tx_sig: Option<String>,
}

impl Milestone {
    /// Unlock amount in lamports, resolving percent-based milestones against
    /// the commitment's current total funding.
    pub fn resolved_unlock_lamports(&self, total_funded_lamports: u64) -> u64 {
        if let Some(lamports) = self.unlock_lamports {
            return lamports;
        }
        match self.unlock_percent {
            Some(percent) => (total_funded_lamports as u128 * percent as u128 / 100) as u64,
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Approve,
    Reject,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Approve => "approve",
            Vote::Reject => "reject",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vote {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "approve" => Ok(Vote::Approve),
            "reject" => Ok(Vote::Reject),
            other => Err(CoreError::parse("vote", other)),
        }
    }
}

/// One signed vote per (commitment, milestone, wallet). The first vote wins;
/// resubmission is a no-op enforced by the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteSignal {
    pub commitment_id: String,
    /// `None` for commitment-level votes (personal deadline resolution).
    pub milestone_id: Option<String>,
    pub signer_wallet: String,
    pub vote: Vote,
    /// Captured at vote time, never re-read.
    pub weight_usd: Decimal,
    pub created_at_unix: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    CommitmentFailure,
    MilestoneFailure,
    VoteReward,
}

impl DistributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionKind::CommitmentFailure => "commitment_failure",
            DistributionKind::MilestoneFailure => "milestone_failure",
            DistributionKind::VoteReward => "vote_reward",
        }
    }

    /// The natural parent key a distribution is created-if-absent under.
    pub fn settlement_key(&self, commitment_id: &str, milestone_id: Option<&str>) -> String {
        match milestone_id {
            Some(m) => format!("{}:{}:{}", self.as_str(), commitment_id, m),
            None => format!("{}:{}", self.as_str(), commitment_id),
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "commitment_failure" => Ok(DistributionKind::CommitmentFailure),
            "milestone_failure" => Ok(DistributionKind::MilestoneFailure),
            "vote_reward" => Ok(DistributionKind::VoteReward),
            other => Err(CoreError::parse("distribution kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionStatus {
    Open,
    Completed,
}

impl DistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionStatus::Open => "open",
            DistributionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "open" => Ok(DistributionStatus::Open),
            "completed" => Ok(DistributionStatus::Completed),
            other => Err(CoreError::parse("distribution status", other)),
        }
    }
}

/// A persisted, immutable-once-created record of how a pot was split.
///
/// Every quantity a retry must agree on is stored explicitly — the
/// idempotency check compares stored vs recomputed fields, never derived
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub id: String,
    pub kind: DistributionKind,
    pub commitment_id: String,
    pub milestone_id: Option<String>,
    pub settlement_key: String,
    pub pot_lamports: u64,
    /// Treasury for failure kinds, commitment owner for vote rewards.
    pub primary_wallet: String,
    pub primary_lamports: u64,
    pub voter_pot_lamports: u64,
    pub allocation_count: u32,
    pub status: DistributionStatus,
    pub created_at_unix: i64,
}

impl Distribution {
    /// Exhaustive comparison of every persisted parameter. Used to detect a
    /// retried creation with drifted inputs, which is a hard error.
    pub fn params_match(&self, other: &Distribution) -> bool {
        self.kind == other.kind
            && self.commitment_id == other.commitment_id
            && self.milestone_id == other.milestone_id
            && self.settlement_key == other.settlement_key
            && self.pot_lamports == other.pot_lamports
            && self.primary_wallet == other.primary_wallet
            && self.primary_lamports == other.primary_lamports
            && self.voter_pot_lamports == other.voter_pot_lamports
            && self.allocation_count == other.allocation_count
    }
}

/// Per-distribution, per-wallet share. Immutable after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub distribution_id: String,
    pub wallet: String,
    pub amount_lamports: u64,
    pub weight: Decimal,
}

/// The idempotency unit: one payout attempt per (distribution, wallet).
/// `tx_sig` stays `None` until the on-chain transfer confirms.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub distribution_id: String,
    pub wallet: String,
    pub amount_lamports: u64,
    pub claimed_at_unix: i64,
    pub tx_sig: Option<String>,
}

/// Audit row written by the fee-share rotation job.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeShareRotation {
    pub id: String,
    pub token_mint: String,
    pub executed_at_unix: i64,
    pub shares_json: String,
}
