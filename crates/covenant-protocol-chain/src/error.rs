use thiserror::Error;

/// Errors that can occur at the chain boundary.
///
/// Timeouts and hard failures are distinct variants: a timed-out transfer
/// may have landed, so callers must not blindly re-acquire state that a
/// failed transfer would let them reclaim.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC client error: {0}")]
    RpcClient(#[from] solana_client::client_error::ClientError),

    #[error("transfer timed out after {attempts} attempts: {last_error}")]
    TransferTimeout { attempts: usize, last_error: String },

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("custodial signer error: {0}")]
    Custodial(String),

    #[error("secret vault error: {0}")]
    Vault(String),

    #[error("chain clock unavailable: {0}")]
    Clock(String),
}

impl ChainError {
    /// Whether the underlying transfer may still land on chain.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChainError::TransferTimeout { .. })
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
