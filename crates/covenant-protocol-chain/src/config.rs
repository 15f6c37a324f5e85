use backoff::ExponentialBackoff;
use solana_sdk::commitment_config::CommitmentConfig;
use std::time::Duration;

/// Configuration for the RPC chain client.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// RPC endpoint URL
    pub rpc_url: String,

    /// Maximum number of send attempts before a transfer is reported as
    /// timed out
    pub max_retries: usize,

    /// Backoff strategy between transfer attempts
    pub retry_backoff: ExponentialBackoff,

    /// Commitment level for transfer confirmation
    pub confirmation_commitment: CommitmentConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8899".to_string(),
            max_retries: 5,
            retry_backoff: ExponentialBackoff {
                initial_interval: Duration::from_millis(500),
                max_interval: Duration::from_secs(30),
                max_elapsed_time: Some(Duration::from_secs(120)),
                multiplier: 2.0,
                ..Default::default()
            },
            confirmation_commitment: CommitmentConfig::confirmed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChainConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(
            config.confirmation_commitment,
            CommitmentConfig::confirmed()
        );
        assert!(config.retry_backoff.max_elapsed_time.is_some());
    }
}
