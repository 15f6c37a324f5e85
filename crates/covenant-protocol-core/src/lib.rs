/*!
# Covenant Protocol Core

Pure domain logic for the commitment & milestone settlement engine:

- **Types**: the `Commitment` aggregate, its `Milestone`s, vote signals,
  distributions, allocations and claims.
- **State machines**: the commitment lifecycle and the lazy milestone
  `advance` function, both free of I/O and clock access.
- **Allocation engine**: largest-remainder splitting of an integer pot
  across weighted recipients, with exact-sum and determinism guarantees.

Everything in this crate is a pure function of its inputs. Persistence,
chain access and orchestration live in the store, chain and engine crates.
*/

pub mod allocation;
pub mod error;
pub mod state_machine;
pub mod types;

pub use allocation::{split_pot, sqrt_weights, Recipient, Share, SplitStrategy};
pub use error::{CoreError, CoreResult};
pub use state_machine::{advance, tally, vote_window, AdvanceConfig, MilestonePatch, VoteTally};
pub use types::{
    Allocation, Claim, Commitment, CommitmentKind, CommitmentStatus, Distribution,
    DistributionKind, DistributionStatus, FeeShareRotation, Milestone, MilestoneStatus, SignerRef,
    Vote, VoteSignal,
};

/// Generate a fresh opaque row id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
