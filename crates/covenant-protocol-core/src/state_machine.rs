/*!
Lazy milestone state machine.

Milestone transitions are computed on every read rather than by a background
timer: callers fetch the milestone, run [`advance`] with the current tally and
clock reading, and persist the returned patch through a forward-only
conditional update. `advance` itself never touches the clock or the store, so
re-reads and concurrent reads are idempotent.
*/

use crate::types::{Milestone, MilestoneStatus, Vote, VoteSignal};
use std::collections::HashSet;

/// Timing and threshold knobs for milestone evaluation.
#[derive(Debug, Clone)]
pub struct AdvanceConfig {
    /// Length of the vote window in seconds.
    pub cutoff_seconds: i64,
    /// Delay between completion and claimability. Zero enables the
    /// straight-to-claimable fast path.
    pub claim_delay_seconds: i64,
    /// How long past `due_at` an uncompleted milestone survives before it
    /// fails as missed delivery.
    pub grace_seconds: i64,
    /// Minimum number of approvals for a milestone to pass.
    pub approval_threshold: u32,
}

impl Default for AdvanceConfig {
    fn default() -> Self {
        Self {
            cutoff_seconds: 86_400,
            claim_delay_seconds: 86_400,
            grace_seconds: 259_200,
            approval_threshold: 15,
        }
    }
}

/// Windowed approve/reject counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub approvals: u32,
    pub rejections: u32,
}

impl VoteTally {
    /// Approval rule: at least `threshold` approvals and strictly more
    /// approvals than rejections.
    pub fn passes(&self, threshold: u32) -> bool {
        self.approvals >= threshold && self.approvals > self.rejections
    }
}

/// The vote window `[start, start + cutoff)` for a completed milestone,
/// anchored at `review_opened_at ?? due_at ?? completed_at`. `None` until
/// the milestone has a completion timestamp.
pub fn vote_window(milestone: &Milestone, cutoff_seconds: i64) -> Option<(i64, i64)> {
    let completed_at = milestone.completed_at_unix?;
    let anchor = milestone
        .review_opened_at_unix
        .or(milestone.due_at_unix)
        .unwrap_or(completed_at);
    Some((anchor, anchor + cutoff_seconds))
}

/// Count one vote per wallet strictly inside `[start, end)`. Votes outside
/// the window never count; a wallet's later signals are ignored.
pub fn tally(votes: &[VoteSignal], window: (i64, i64)) -> VoteTally {
    let (start, end) = window;
    let mut ordered: Vec<&VoteSignal> = votes.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at_unix
            .cmp(&b.created_at_unix)
            .then_with(|| a.signer_wallet.cmp(&b.signer_wallet))
    });

    let mut seen = HashSet::new();
    let mut result = VoteTally::default();
    for vote in ordered {
        if vote.created_at_unix < start || vote.created_at_unix >= end {
            continue;
        }
        if !seen.insert(vote.signer_wallet.as_str()) {
            continue;
        }
        match vote.vote {
            Vote::Approve => result.approvals += 1,
            Vote::Reject => result.rejections += 1,
        }
    }
    result
}

/// A computed forward transition, applied through a conditional update
/// guarded on `from_status` so concurrent readers persist it at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestonePatch {
    pub from_status: MilestoneStatus,
    pub to_status: MilestoneStatus,
    pub became_claimable_at_unix: Option<i64>,
}

/// Evaluate the lazy milestone transitions at `now`.
///
/// Guards run in a fixed order and are mutually exclusive by construction:
///
/// 1. Terminal states never change.
/// 2. Locked and never completed: fail once `due_at + grace ≤ now`.
///    Completion beats grace expiry — a completed milestone can never hit
///    this guard.
/// 3. Locked and completed: wait out the vote window, then approve (or go
///    straight to claimable when the claim delay is zero) or fail on the
///    tally. The zero-delay fast path sits after the failure guards, so
///    "approved with zero delay" and "grace expired while unapproved" can
///    never both fire.
/// 4. Approved: become claimable once `completed_at + claim_delay ≤ now`.
/// 5. Claimable: no lazy change; release is payout-driven.
pub fn advance(
    milestone: &Milestone,
    tally: &VoteTally,
    now: i64,
    config: &AdvanceConfig,
) -> Option<MilestonePatch> {
    match milestone.status {
        MilestoneStatus::Released | MilestoneStatus::Failed => None,

        MilestoneStatus::Locked => match milestone.completed_at_unix {
            None => {
                let due_at = milestone.due_at_unix?;
                if due_at + config.grace_seconds <= now {
                    Some(MilestonePatch {
                        from_status: MilestoneStatus::Locked,
                        to_status: MilestoneStatus::Failed,
                        became_claimable_at_unix: None,
                    })
                } else {
                    None
                }
            }
            Some(_) => {
                let (_, window_end) = vote_window(milestone, config.cutoff_seconds)?;
                if now < window_end {
                    // Completed, awaiting votes.
                    return None;
                }
                if tally.passes(config.approval_threshold) {
                    if config.claim_delay_seconds == 0 {
                        Some(MilestonePatch {
                            from_status: MilestoneStatus::Locked,
                            to_status: MilestoneStatus::Claimable,
                            became_claimable_at_unix: Some(now),
                        })
                    } else {
                        Some(MilestonePatch {
                            from_status: MilestoneStatus::Locked,
                            to_status: MilestoneStatus::Approved,
                            became_claimable_at_unix: None,
                        })
                    }
                } else {
                    Some(MilestonePatch {
                        from_status: MilestoneStatus::Locked,
                        to_status: MilestoneStatus::Failed,
                        became_claimable_at_unix: None,
                    })
                }
            }
        },

        MilestoneStatus::Approved => {
            let completed_at = milestone.completed_at_unix?;
            if completed_at + config.claim_delay_seconds <= now {
                Some(MilestonePatch {
                    from_status: MilestoneStatus::Approved,
                    to_status: MilestoneStatus::Claimable,
                    became_claimable_at_unix: Some(now),
                })
            } else {
                None
            }
        }

        MilestoneStatus::Claimable => None,
    }
}
