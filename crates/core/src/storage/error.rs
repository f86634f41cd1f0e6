use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    /// The stored lock version did not match the one the caller loaded.
    #[error("{entity_type} was modified concurrently: {id}")]
    ConcurrentModification {
        entity_type: &'static str,
        id: String,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
