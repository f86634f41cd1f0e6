//! surveyor - versioned survey content management.
//!
//! The [`VersioningEngine`] runs the survey lifecycle on top of the
//! repository traits from `surveyor_core`. Storage backends live in
//! [`storage`], upload schema bridges in [`schema`].

pub mod cli;
pub mod config;
pub mod demo;
pub mod mock_data;
pub mod output;
pub mod schema;
pub mod storage;
pub mod versioning;

pub use config::Config;
pub use versioning::VersioningEngine;
