use thiserror::Error;

/// Errors returned by a [`SchemaBridge`](super::SchemaBridge).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Upload schema not found: {id}")]
    NotFound { id: String },
    #[error("Upload schema operation failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let error = SchemaError::NotFound {
            id: "demographics".to_string(),
        };
        assert_eq!(error.to_string(), "Upload schema not found: demographics");

        let error = SchemaError::Failed("unsupported type".to_string());
        assert_eq!(
            error.to_string(),
            "Upload schema operation failed: unsupported type"
        );
    }
}
