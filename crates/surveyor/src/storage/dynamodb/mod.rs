//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the repository traits
//! using `aws-sdk-dynamodb`. Surveys and elements share one table; see
//! [`keys`] for the layout.

mod conversions;
mod error;
mod keys;
mod repository;

pub use repository::DynamoDbRepository;
