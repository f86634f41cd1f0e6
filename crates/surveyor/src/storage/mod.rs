//! Storage backend implementations.
//!
//! This module provides concrete implementations of the repository traits
//! defined in `surveyor_core::storage`. The in-memory backend is always
//! compiled; persistent backends are selected via feature flags.
//!
//! # Feature Flags
//!
//! - `sqlite`: SQLite storage backend using `rusqlite` and `tokio-rusqlite`
//! - `dynamodb`: AWS DynamoDB storage backend using `aws-sdk-dynamodb`
//!
//! Both can be enabled at once; the CLI picks one at runtime.
//!
//! # Examples
//!
//! Build with SQLite:
//! ```bash
//! cargo build -p surveyor --features sqlite
//! ```
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p surveyor --features dynamodb
//! ```

pub mod inmemory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use inmemory::InMemoryRepository;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbRepository;
