//! CLI command definitions.

pub mod args;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::StorageKind;

pub use args::{parse_timestamp, RevisionArgs, SurveyArgs};

/// Administrative CLI for versioned surveys.
#[derive(Debug, Parser)]
#[command(name = "surveyor")]
#[command(version, about = "Manage versioned surveys", long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Storage backend (defaults to the most durable one compiled in).
    #[arg(long, global = true, env = "SURVEY_STORAGE")]
    pub storage: Option<StorageKind>,

    /// Suppress non-essential output.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a draft survey from a JSON file.
    Create {
        /// Path to the survey JSON.
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace the content of an unpublished revision from a JSON file.
    Update {
        /// Study ID.
        #[arg(long)]
        study: String,
        /// Path to the survey JSON, including guid, createdOn and version.
        #[arg(long)]
        file: PathBuf,
    },
    /// Publish a revision.
    Publish {
        #[command(flatten)]
        revision: RevisionArgs,
        /// Cut a new upload schema revision instead of reusing the current one.
        #[arg(long)]
        new_schema_revision: bool,
        /// Expected lock version (defaults to the stored one).
        #[arg(long)]
        lock_version: Option<u64>,
    },
    /// Branch a new draft revision off an existing one.
    Branch {
        #[command(flatten)]
        revision: RevisionArgs,
    },
    /// Soft-delete a revision.
    Delete {
        #[command(flatten)]
        revision: RevisionArgs,
        /// Expected lock version (defaults to the stored one).
        #[arg(long)]
        lock_version: Option<u64>,
    },
    /// Permanently remove a revision, its elements and schemas.
    Purge {
        #[command(flatten)]
        revision: RevisionArgs,
    },
    /// Get one revision.
    Get {
        #[command(flatten)]
        revision: RevisionArgs,
        /// Omit the element list.
        #[arg(long)]
        no_elements: bool,
    },
    /// Get the most recent revision of a survey.
    Latest {
        #[command(flatten)]
        survey: SurveyArgs,
        /// Only consider published revisions.
        #[arg(long)]
        published: bool,
    },
    /// List every revision of a survey, most recent first.
    Versions {
        #[command(flatten)]
        survey: SurveyArgs,
        /// Include soft-deleted revisions.
        #[arg(long)]
        include_deleted: bool,
    },
    /// Resolve a survey identifier to its GUID.
    Lookup {
        /// Study ID.
        #[arg(long)]
        study: String,
        /// Survey identifier.
        #[arg(long)]
        identifier: String,
        /// Also match soft-deleted surveys.
        #[arg(long)]
        include_deleted: bool,
    },
    /// List the latest revision of every survey in a study.
    List {
        /// Study ID.
        #[arg(long)]
        study: String,
        /// Only consider published revisions.
        #[arg(long)]
        published: bool,
    },
    /// Walk a demo survey through its whole lifecycle.
    Demo {
        /// Study ID.
        #[arg(long, default_value = "demo-study")]
        study: String,
    },
}
