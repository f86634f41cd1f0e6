//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError` from `surveyor_core::storage`.
//! Each operation only matches the modeled exceptions it gives meaning to
//! (mostly failed conditions); everything else is classified by error code.

use std::error::Error;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use surveyor_core::storage::RepositoryError;

/// Classifies a service error by its DynamoDB error code.
pub fn failure_for_code(
    operation: &str,
    code: Option<&str>,
    message: Option<&str>,
) -> RepositoryError {
    let reason = match code {
        Some("ResourceNotFoundException") => "table not found".to_string(),
        Some(
            "ProvisionedThroughputExceededException"
            | "RequestLimitExceeded"
            | "ThrottlingException",
        ) => "throughput exceeded, please retry".to_string(),
        Some("TransactionConflictException" | "TransactionInProgressException") => {
            "transaction conflict, please retry".to_string()
        }
        Some("TransactionCanceledException") => format!(
            "transaction cancelled: {}",
            message.unwrap_or("no reason given")
        ),
        Some("ItemCollectionSizeLimitExceededException") => {
            "item collection size limit exceeded".to_string()
        }
        Some("InternalServerError") => "DynamoDB internal server error".to_string(),
        Some(other) => format!("{other}: {}", message.unwrap_or("no message")),
        None => message.unwrap_or("unknown error").to_string(),
    };
    RepositoryError::QueryFailed(format!("{operation} failed: {reason}"))
}

/// Maps transport-level failures, leaving service errors to the caller.
fn transport_failure<E, R>(operation: &str, err: &SdkError<E, R>) -> Option<RepositoryError>
where
    E: Error + 'static,
    R: Debug,
{
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            Some(RepositoryError::ConnectionFailed(format!(
                "{operation}: {}",
                DisplayErrorContext(err)
            )))
        }
        _ => None,
    }
}

fn service_failure(operation: &str, err: &impl ProvideErrorMetadata) -> RepositoryError {
    failure_for_code(operation, err.code(), err.message())
}

/// Map a GetItem SDK error to RepositoryError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> RepositoryError {
    if let Some(failure) = transport_failure("GetItem", &err) {
        return failure;
    }
    service_failure("GetItem", &err.into_service_error())
}

/// Map a Query SDK error to RepositoryError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> RepositoryError {
    if let Some(failure) = transport_failure("Query", &err) {
        return failure;
    }
    service_failure("Query", &err.into_service_error())
}

/// Map a PutItem SDK error to RepositoryError.
///
/// `conflict` is returned when the put's condition fails: `AlreadyExists`
/// for inserts, `ConcurrentModification` for version-checked updates.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    conflict: RepositoryError,
) -> RepositoryError {
    if let Some(failure) = transport_failure("PutItem", &err) {
        return failure;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => conflict,
        other => service_failure("PutItem", &other),
    }
}

/// Map an UpdateItem SDK error to RepositoryError.
///
/// Updates are always version-checked, so a failed condition means the
/// caller's version is stale or the item is gone.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    if let Some(failure) = transport_failure("UpdateItem", &err) {
        return failure;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => {
            RepositoryError::ConcurrentModification {
                entity_type,
                id: id.into(),
            }
        }
        other => service_failure("UpdateItem", &other),
    }
}

/// Map a DeleteItem SDK error to RepositoryError.
///
/// Deletes require the item to exist; a failed condition is `NotFound`.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    if let Some(failure) = transport_failure("DeleteItem", &err) {
        return failure;
    }
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => RepositoryError::NotFound {
            entity_type,
            id: id.into(),
        },
        other => service_failure("DeleteItem", &other),
    }
}

/// Map a TransactWriteItems SDK error to RepositoryError.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
) -> RepositoryError {
    if let Some(failure) = transport_failure("TransactWriteItems", &err) {
        return failure;
    }
    service_failure("TransactWriteItems", &err.into_service_error())
}

/// Map a request builder error (missing required field) to RepositoryError.
pub fn map_build_error(err: BuildError) -> RepositoryError {
    RepositoryError::InvalidData(format!("Invalid DynamoDB request: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(err: RepositoryError) -> String {
        match err {
            RepositoryError::QueryFailed(reason) => reason,
            other => panic!("Expected QueryFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_throttling_codes_ask_for_retry() {
        for code in [
            "ProvisionedThroughputExceededException",
            "RequestLimitExceeded",
            "ThrottlingException",
        ] {
            let err = failure_for_code("Query", Some(code), None);
            assert_eq!(reason(err), "Query failed: throughput exceeded, please retry");
        }
    }

    #[test]
    fn test_missing_table() {
        let err = failure_for_code("PutItem", Some("ResourceNotFoundException"), Some("gone"));
        assert_eq!(reason(err), "PutItem failed: table not found");
    }

    #[test]
    fn test_cancelled_transaction_keeps_message() {
        let err = failure_for_code(
            "TransactWriteItems",
            Some("TransactionCanceledException"),
            Some("Transaction cancelled, please refer cancellation reasons"),
        );
        assert!(reason(err).contains("please refer cancellation reasons"));
    }

    #[test]
    fn test_unknown_code_and_missing_code() {
        let err = failure_for_code("GetItem", Some("ValidationException"), Some("bad key"));
        assert_eq!(reason(err), "GetItem failed: ValidationException: bad key");

        let err = failure_for_code("GetItem", None, None);
        assert_eq!(reason(err), "GetItem failed: unknown error");
    }

    #[test]
    fn test_build_error_is_invalid_data() {
        let err = aws_sdk_dynamodb::types::Put::builder().build().unwrap_err();
        assert!(matches!(
            map_build_error(err),
            RepositoryError::InvalidData(_)
        ));
    }
}
