use crate::error::{CliError, CliResult};
use clap::Args;
use covenant_protocol_chain::{ChainClient, ChainConfig, RpcChainClient, SecretVault};
use covenant_protocol_engine::{
    ClaimService, CommitmentService, EngineConfig, SettlementEngine, VotingService,
};
use covenant_protocol_store::{CommitmentStore, MemoryStore, SqlStore};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Flags shared by every subcommand.
#[derive(Args)]
pub struct Globals {
    /// SQLite database path
    #[arg(long, global = true, default_value = "covenant.db")]
    pub database: PathBuf,

    /// Use an in-memory store instead of SQLite
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Solana RPC endpoint
    #[arg(long, global = true, default_value = "http://localhost:8899")]
    pub rpc_url: String,

    /// Engine configuration overrides (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hex-encoded 32-byte key for the escrow secret vault
    #[arg(long, global = true)]
    pub vault_key: Option<String>,
}

/// Shared wiring built once per invocation.
pub struct Context {
    pub store: Arc<dyn CommitmentStore>,
    pub chain: Arc<dyn ChainClient>,
    pub config: EngineConfig,
    vault: Option<Arc<SecretVault>>,
}

impl Context {
    pub async fn build(globals: &Globals) -> CliResult<Self> {
        let store: Arc<dyn CommitmentStore> = if globals.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(SqlStore::open_file(&globals.database).await?)
        };

        let chain_config = ChainConfig {
            rpc_url: globals.rpc_url.clone(),
            ..ChainConfig::default()
        };
        let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(chain_config));

        let config = match &globals.config {
            Some(path) => EngineConfig::load_yaml(path)?,
            None => EngineConfig::default(),
        };

        let vault = globals
            .vault_key
            .as_deref()
            .map(SecretVault::from_hex_key)
            .transpose()?
            .map(Arc::new);

        Ok(Self {
            store,
            chain,
            config,
            vault,
        })
    }

    pub fn vault(&self) -> CliResult<Arc<SecretVault>> {
        self.vault.clone().ok_or_else(|| {
            CliError::InvalidArgument("--vault-key is required for this command".to_string())
        })
    }

    pub fn commitments(&self) -> CommitmentService {
        CommitmentService::new(self.store.clone(), self.chain.clone(), self.config.clone())
    }

    pub fn voting(&self) -> VotingService {
        VotingService::new(self.store.clone(), self.chain.clone(), self.config.clone())
    }

    /// Settlement and claims move funds; they refuse to run on a config
    /// that never passed validation (no `--config` means an empty treasury
    /// wallet, which would persist an unclaimable distribution).
    pub fn settlement(&self) -> CliResult<SettlementEngine> {
        self.config.validate()?;
        Ok(SettlementEngine::new(
            self.store.clone(),
            self.chain.clone(),
            self.vault()?,
            self.config.clone(),
        ))
    }

    pub fn claims(&self) -> CliResult<ClaimService> {
        self.config.validate()?;
        Ok(ClaimService::new(
            self.store.clone(),
            self.chain.clone(),
            self.vault()?,
            self.config.clone(),
        ))
    }
}

pub fn parse_pubkey(label: &str, value: &str) -> CliResult<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|_| CliError::InvalidArgument(format!("{label} is not a valid pubkey: {value}")))
}

pub fn parse_signature(value: &str) -> CliResult<Signature> {
    Signature::from_str(value)
        .map_err(|_| CliError::InvalidArgument(format!("not a valid signature: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> Globals {
        Globals {
            database: PathBuf::from("unused.db"),
            in_memory: true,
            rpc_url: "http://localhost:8899".to_string(),
            config: None,
            vault_key: Some("aa".repeat(32)),
        }
    }

    #[tokio::test]
    async fn fund_moving_services_reject_an_unvalidated_default_config() {
        let ctx = Context::build(&globals()).await.unwrap();

        // No --config means an empty treasury wallet; settlement and claims
        // must refuse rather than persist an unclaimable distribution.
        assert!(ctx.settlement().is_err());
        assert!(ctx.claims().is_err());

        // Read and issuance paths still work without a config file.
        let _ = ctx.commitments();
        let _ = ctx.voting();
    }
}
