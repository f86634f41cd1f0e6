//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `RepositoryError` from `surveyor_core::storage`.
//! Specific errors are mapped to semantic variants (e.g., PRIMARY KEY constraint to AlreadyExists).

use surveyor_core::storage::RepositoryError;

/// Maps a rusqlite error to a RepositoryError.
///
/// # Error Mapping
///
/// - `SQLITE_CONSTRAINT_PRIMARYKEY` / `SQLITE_CONSTRAINT_UNIQUE` → `RepositoryError::AlreadyExists`
/// - Connection errors → `RepositoryError::ConnectionFailed`
/// - Row conversion failures → `RepositoryError::InvalidData`
/// - All other errors → `RepositoryError::QueryFailed`
fn map_rusqlite_error(
    err: &rusqlite::Error,
    entity_type: &'static str,
    id: &str,
) -> RepositoryError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepositoryError::AlreadyExists {
                entity_type,
                id: id.to_string(),
            }
        }

        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::CannotOpen =>
        {
            RepositoryError::ConnectionFailed(format!("Cannot open database: {err}"))
        }

        rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
            entity_type,
            id: id.to_string(),
        },

        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            RepositoryError::InvalidData(format!("{entity_type} {id}: {err}"))
        }

        _ => RepositoryError::QueryFailed(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a RepositoryError.
///
/// This is the main entry point for error mapping in async code. It extracts
/// the inner `rusqlite::Error` if present, otherwise maps to a generic
/// `QueryFailed` error. `id` names the entity in the resulting error.
pub fn map_tokio_rusqlite_error(
    err: tokio_rusqlite::Error,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    let id_str = id.into();
    match &err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => {
            map_rusqlite_error(rusqlite_err, entity_type, &id_str)
        }
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => {
            RepositoryError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        _ => RepositoryError::QueryFailed(err.to_string()),
    }
}

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
pub fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}
