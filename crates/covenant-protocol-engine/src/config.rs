use crate::{EngineError, EngineResult};
use covenant_protocol_core::AdvanceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fee share rotation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Number of leaderboard wallets that share the rotating pool
    pub top_n: usize,

    /// Basis points reserved for the base wallet every rotation
    pub base_share_bps: u64,

    /// Wallet that always receives the reserved share
    pub base_wallet: String,

    /// Protocol-operated wallets excluded from leaderboards
    pub reserved_wallets: Vec<String>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            top_n: 7,
            base_share_bps: 5_000,
            base_wallet: String::new(),
            reserved_wallets: Vec::new(),
        }
    }
}

/// Engine-wide configuration. The CLI loads overrides from a YAML file;
/// everything has a default except the treasury and base wallets, which
/// `validate` requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of every vote window in seconds
    pub cutoff_seconds: i64,

    /// Delay between milestone completion and claimability
    pub claim_delay_seconds: i64,

    /// Grace past `due_at` before an uncompleted milestone fails
    pub grace_seconds: i64,

    /// Minimum approvals for a milestone to pass
    pub approval_threshold: u32,

    /// Treasury share of a failure pot, in basis points
    pub buyback_bps: u64,

    /// Voter share of a released milestone pot, in basis points
    pub vote_reward_bps: u64,

    /// Multiplier applied to captured vote weights
    pub vote_weight_multiplier: u32,

    /// Shares below this many lamports are dropped and redistributed
    pub dust_lamports: u64,

    /// Age after which an unsigned claim row counts as abandoned
    pub claim_ttl_seconds: i64,

    /// Wallet receiving the treasury share of failure settlements
    pub treasury_wallet: String,

    pub rotation: RotationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cutoff_seconds: 86_400,
            claim_delay_seconds: 86_400,
            grace_seconds: 259_200,
            approval_threshold: 15,
            buyback_bps: 5_000,
            vote_reward_bps: 100,
            vote_weight_multiplier: 1,
            dust_lamports: 0,
            claim_ttl_seconds: 600,
            treasury_wallet: String::new(),
            rotation: RotationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file and validate.
    pub fn load_yaml(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|e| EngineError::Validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.buyback_bps > 10_000 {
            return Err(EngineError::Validation(format!(
                "buyback_bps {} exceeds 10_000",
                self.buyback_bps
            )));
        }
        if self.vote_reward_bps > 10_000 {
            return Err(EngineError::Validation(format!(
                "vote_reward_bps {} exceeds 10_000",
                self.vote_reward_bps
            )));
        }
        if self.rotation.base_share_bps > 10_000 {
            return Err(EngineError::Validation(format!(
                "rotation.base_share_bps {} exceeds 10_000",
                self.rotation.base_share_bps
            )));
        }
        if self.cutoff_seconds <= 0 {
            return Err(EngineError::Validation(
                "cutoff_seconds must be positive".to_string(),
            ));
        }
        if self.claim_delay_seconds < 0 || self.grace_seconds < 0 {
            return Err(EngineError::Validation(
                "delays must be non-negative".to_string(),
            ));
        }
        if self.approval_threshold == 0 {
            return Err(EngineError::Validation(
                "approval_threshold must be at least 1".to_string(),
            ));
        }
        if self.claim_ttl_seconds <= 0 {
            return Err(EngineError::Validation(
                "claim_ttl_seconds must be positive".to_string(),
            ));
        }
        if self.treasury_wallet.is_empty() {
            return Err(EngineError::Validation(
                "treasury_wallet is required".to_string(),
            ));
        }
        if self.rotation.top_n == 0 {
            return Err(EngineError::Validation(
                "rotation.top_n must be at least 1".to_string(),
            ));
        }
        if self.rotation.base_wallet.is_empty() {
            return Err(EngineError::Validation(
                "rotation.base_wallet is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The subset the milestone state machine needs.
    pub fn advance_config(&self) -> AdvanceConfig {
        AdvanceConfig {
            cutoff_seconds: self.cutoff_seconds,
            claim_delay_seconds: self.claim_delay_seconds,
            grace_seconds: self.grace_seconds,
            approval_threshold: self.approval_threshold,
        }
    }
}
