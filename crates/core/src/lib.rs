//! Core domain logic for versioned survey content.
//!
//! This crate is the Functional Core of surveyor: survey and element types,
//! rule reconciliation, and the traits the application crate implements for
//! persistence and schema generation. Nothing in here performs I/O.

pub mod schema;
pub mod storage;
pub mod survey;
