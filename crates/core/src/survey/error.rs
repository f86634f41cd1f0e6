use thiserror::Error;

use crate::schema::SchemaError;
use crate::storage::RepositoryError;

/// Errors surfaced by survey lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurveyError {
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
    #[error("{entity_type} was modified concurrently: {id}")]
    ConcurrentModification {
        entity_type: &'static str,
        id: String,
    },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl SurveyError {
    pub fn survey_not_found(id: impl Into<String>) -> Self {
        SurveyError::NotFound {
            entity_type: "Survey",
            id: id.into(),
        }
    }
}

impl From<RepositoryError> for SurveyError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity_type, id } => {
                SurveyError::NotFound { entity_type, id }
            }
            RepositoryError::AlreadyExists { entity_type, id } => {
                SurveyError::AlreadyExists { entity_type, id }
            }
            RepositoryError::ConcurrentModification { entity_type, id } => {
                SurveyError::ConcurrentModification { entity_type, id }
            }
            other => SurveyError::StorageFailure(other.to_string()),
        }
    }
}

impl From<SchemaError> for SurveyError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::NotFound { id } => SurveyError::NotFound {
                entity_type: "UploadSchema",
                id,
            },
            other => SurveyError::StorageFailure(other.to_string()),
        }
    }
}

/// Result type for survey lifecycle operations.
pub type Result<T> = std::result::Result<T, SurveyError>;
