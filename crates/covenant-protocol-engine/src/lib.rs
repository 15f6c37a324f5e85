/*!
# Covenant Protocol Engine

Orchestration layer over the store and the chain boundary:

- [`CommitmentService`]: issuance, activation, funding, milestones, and
  the lazy read path.
- [`VotingService`]: signed, windowed, first-vote-wins vote intake.
- [`SettlementEngine`]: deadline resolution and milestone settlement into
  idempotent distributions.
- [`ClaimService`]: the three-phase at-most-once claim protocol.
- [`FeeRotationJob`]: leaderboard-driven fee share rotation.

Services are stateless between calls; every concurrency decision is a
conditional write in the store, never an in-process lock.
*/

mod claims;
mod commitments;
mod config;
mod error;
mod fee_rotation;
mod settlement;
mod voting;

pub use claims::{ClaimOutcome, ClaimService, ClaimSweep};
pub use commitments::{CommitmentService, CommitmentView, MilestoneSpec};
pub use config::{EngineConfig, RotationConfig};
pub use error::{EngineError, EngineResult};
pub use fee_rotation::{FeeRotationJob, FeeRouter, FeeShare, RotationSummary, TokenLeaderboard};
pub use settlement::{Resolution, SettlementEngine};
pub use voting::{VoteOutcome, VotingService};
