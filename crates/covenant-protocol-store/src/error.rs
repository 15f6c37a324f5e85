use covenant_protocol_core::CoreError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// A persisted row failed to parse back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(#[from] CoreError),

    #[error("row not found: {0}")]
    NotFound(String),
}
