use covenant_protocol_chain::ChainError;
use covenant_protocol_core::CoreError;
use covenant_protocol_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the engine services.
///
/// Conflict-kind variants mean a concurrent or repeated call got there
/// first; callers treat them as "already done / in progress", not as
/// failures. `Dependency` wraps chain errors and preserves the
/// timeout-vs-hard-failure distinction.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("commitment {0} is already resolving")]
    AlreadyResolving(String),

    #[error("claim for ({distribution_id}, {wallet}) is already in flight")]
    ClaimInFlight {
        distribution_id: String,
        wallet: String,
    },

    #[error("stored distribution {settlement_key} disagrees with recomputed parameters")]
    DistributionMismatch { settlement_key: String },

    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("chain dependency error: {0}")]
    Dependency(#[from] ChainError),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Conflict-kind errors: the protocol says the caller should read these
    /// as "already done / in progress".
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyResolving(_)
                | EngineError::ClaimInFlight { .. }
                | EngineError::Conflict(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
