use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Engine(#[from] covenant_protocol_engine::EngineError),

    #[error(transparent)]
    Store(#[from] covenant_protocol_store::StoreError),

    #[error(transparent)]
    Chain(#[from] covenant_protocol_chain::ChainError),
}

impl CliError {
    /// Conflict-kind engine errors are "already done / in progress", not
    /// failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CliError::Engine(e) if e.is_conflict())
    }
}
