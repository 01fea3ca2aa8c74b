//! Error types for the autoscaler broker stores.

use thiserror::Error;

/// Result type alias for low-level redb operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by the embedded database layer.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

/// Result type alias for store contract operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcomes a store contract can report besides success.
///
/// Callers match on the variant, never on the message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} does not exist")]
    DoesNotExist(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} conflicts with an existing record")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(#[from] StateError),
}

impl StoreError {
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, StoreError::DoesNotExist(_))
    }
}
