//! Survey lifecycle: create, edit, branch, publish and delete revisions.
//!
//! The [`VersioningEngine`] owns every write. Repositories stay dumb
//! persistence adapters behind the traits in `surveyor_core::storage`.

mod compensation;
mod engine;

pub use engine::VersioningEngine;
