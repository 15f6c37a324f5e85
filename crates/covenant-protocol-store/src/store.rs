use crate::StoreResult;
use async_trait::async_trait;
use covenant_protocol_core::{
    Allocation, Claim, Commitment, CommitmentStatus, Distribution, FeeShareRotation, Milestone,
    MilestonePatch, VoteSignal,
};

/// Outcome of the create-if-absent distribution insert. `Existing` carries
/// the stored row so the caller can run its exhaustive parameter comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateDistribution {
    Created,
    Existing(Distribution),
}

/// Outcome of the claim acquire insert.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimAcquire {
    Inserted,
    Existing(Claim),
}

/// Durable CRUD plus the conditional state-transition operations the engine
/// coordinates through. Conditional methods return `false` when the guard
/// matched zero rows; callers treat that as "someone else got there first",
/// never as a retryable error.
#[async_trait]
pub trait CommitmentStore: Send + Sync {
    // ---- commitments ----------------------------------------------------

    async fn insert_commitment(&self, commitment: &Commitment) -> StoreResult<()>;

    async fn fetch_commitment(&self, id: &str) -> StoreResult<Option<Commitment>>;

    async fn list_commitments(&self) -> StoreResult<Vec<Commitment>>;

    /// The resolving lock: `status := resolving, prior_status := status`
    /// guarded on `status IN (created, active)`. Exactly one concurrent
    /// caller wins.
    async fn acquire_resolving(&self, id: &str, now: i64) -> StoreResult<bool>;

    /// Compensating transition: restore `prior_status` if still resolving.
    async fn release_resolving(&self, id: &str, now: i64) -> StoreResult<bool>;

    /// `resolving → terminal`, recording the resolution signature.
    async fn finish_resolving(
        &self,
        id: &str,
        terminal: CommitmentStatus,
        tx_sig: Option<&str>,
        now: i64,
    ) -> StoreResult<bool>;

    /// Generic guarded transition for the non-resolving edges.
    async fn transition_commitment(
        &self,
        id: &str,
        allowed_from: &[CommitmentStatus],
        to: CommitmentStatus,
        now: i64,
    ) -> StoreResult<bool>;

    async fn set_reward_funding(
        &self,
        id: &str,
        total_funded_lamports: u64,
        now: i64,
    ) -> StoreResult<bool>;

    /// Raise `unlocked_lamports` by `delta`, guarded so the result never
    /// exceeds `total_funded_lamports`.
    async fn add_unlocked(&self, id: &str, delta_lamports: u64, now: i64) -> StoreResult<bool>;

    // ---- milestones -----------------------------------------------------

    async fn insert_milestone(&self, milestone: &Milestone) -> StoreResult<()>;

    async fn fetch_milestone(&self, id: &str) -> StoreResult<Option<Milestone>>;

    /// All milestones of a commitment, ordered by `position`.
    async fn fetch_milestones(&self, commitment_id: &str) -> StoreResult<Vec<Milestone>>;

    /// Creator-signed completion: stamps the timestamps, guarded on the
    /// milestone still being locked and uncompleted.
    async fn set_milestone_completed(
        &self,
        id: &str,
        completed_at_unix: i64,
        review_opened_at_unix: Option<i64>,
        claimable_at_unix: i64,
    ) -> StoreResult<bool>;

    /// Persist a lazily computed transition, guarded on `from_status` so
    /// concurrent readers apply it at most once.
    async fn apply_milestone_advance(&self, id: &str, patch: &MilestonePatch) -> StoreResult<bool>;

    /// `claimable → released`, recorded with the confirmed transfer
    /// signature.
    async fn mark_milestone_released(
        &self,
        id: &str,
        released_at_unix: i64,
        tx_sig: Option<&str>,
    ) -> StoreResult<bool>;

    // ---- votes ----------------------------------------------------------

    /// First vote wins. Returns `false` when the (commitment, milestone,
    /// wallet) key already exists; the duplicate is a no-op.
    async fn insert_vote_if_absent(&self, vote: &VoteSignal) -> StoreResult<bool>;

    /// Votes for a commitment (and optionally one milestone), ordered by
    /// `created_at_unix`.
    async fn fetch_votes(
        &self,
        commitment_id: &str,
        milestone_id: Option<&str>,
    ) -> StoreResult<Vec<VoteSignal>>;

    // ---- distributions --------------------------------------------------

    /// Insert the distribution and all its allocations in one transaction,
    /// keyed by `settlement_key`. On conflict nothing is written and the
    /// stored row is returned.
    async fn create_distribution_if_absent(
        &self,
        distribution: &Distribution,
        allocations: &[Allocation],
    ) -> StoreResult<CreateDistribution>;

    async fn fetch_distribution(&self, id: &str) -> StoreResult<Option<Distribution>>;

    async fn fetch_distribution_by_key(
        &self,
        settlement_key: &str,
    ) -> StoreResult<Option<Distribution>>;

    async fn fetch_allocations(&self, distribution_id: &str) -> StoreResult<Vec<Allocation>>;

    /// `open → completed`.
    async fn complete_distribution(&self, id: &str) -> StoreResult<bool>;

    // ---- claims ---------------------------------------------------------

    /// The acquire step of the claim protocol: conditional insert on the
    /// (distribution, wallet) key.
    async fn insert_claim_if_absent(&self, claim: &Claim) -> StoreResult<ClaimAcquire>;

    async fn fetch_claim(&self, distribution_id: &str, wallet: &str) -> StoreResult<Option<Claim>>;

    async fn fetch_claims(&self, distribution_id: &str) -> StoreResult<Vec<Claim>>;

    /// Record the confirmed transfer, guarded by `tx_sig IS NULL` so a
    /// concurrently finalized row is never overwritten.
    async fn finalize_claim(
        &self,
        distribution_id: &str,
        wallet: &str,
        tx_sig: &str,
    ) -> StoreResult<bool>;

    /// Remove an unsigned claim row (abandoned or failed) so a future
    /// attempt can re-acquire. Signed rows are never deleted.
    async fn delete_unsigned_claim(&self, distribution_id: &str, wallet: &str)
        -> StoreResult<bool>;

    // ---- fee rotation audit --------------------------------------------

    async fn record_fee_rotation(&self, rotation: &FeeShareRotation) -> StoreResult<()>;

    async fn list_fee_rotations(&self, token_mint: &str) -> StoreResult<Vec<FeeShareRotation>>;
}
