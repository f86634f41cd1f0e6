//! In-memory storage backend.
//!
//! Stores survey revisions and their elements in HashMaps wrapped in
//! `Arc<RwLock<_>>`. Always compiled; used by tests, the `demo` command and
//! whenever no persistent backend is configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use surveyor::storage::inmemory::InMemoryRepository;
//!
//! let repo = InMemoryRepository::new();
//! // Use repo for testing...
//! ```

mod repository;

pub use repository::InMemoryRepository;
