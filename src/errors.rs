use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("PARSE_FAILURE: {0}")]
    Parse(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("MIGRATION_FAILURE: {0}")]
    Migration(String),
    #[error("INVALID_INPUT: {0}")]
    Invalid(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Migration(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
