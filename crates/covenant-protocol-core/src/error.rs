use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("unparseable {field}: {value}")]
    Parse { field: &'static str, value: String },
}

impl CoreError {
    pub fn parse(field: &'static str, value: impl Into<String>) -> Self {
        CoreError::Parse {
            field,
            value: value.into(),
        }
    }
}
