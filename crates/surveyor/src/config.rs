use std::{env, fmt, str::FromStr};

use clap::ValueEnum;
use thiserror::Error;

/// Errors raised when parsing configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0} (expected memory, sqlite or dynamodb)")]
    UnknownStorage(String),
    #[error("Unknown log format: {0} (expected pretty or json)")]
    UnknownLogFormat(String),
}

/// Storage backend used by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    #[value(alias = "inmemory")]
    Memory,
    Sqlite,
    Dynamodb,
}

impl Default for StorageKind {
    /// The most durable backend compiled into this build.
    fn default() -> Self {
        if cfg!(feature = "sqlite") {
            StorageKind::Sqlite
        } else if cfg!(feature = "dynamodb") {
            StorageKind::Dynamodb
        } else {
            StorageKind::Memory
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}

/// Parses with the same names and aliases the `--storage` flag accepts.
impl FromStr for StorageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| ConfigError::UnknownStorage(s.trim().to_string()))
    }
}

/// Log line format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::UnknownLogFormat(other.to_string())),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend (default: depends on enabled features)
    pub storage: StorageKind,
    /// Path to SQLite database file (default: "surveyor.db")
    /// Note: Only used when the `sqlite` feature is enabled.
    pub sqlite_path: String,
    /// DynamoDB table name (default: "surveyor")
    /// Note: Only used when the `dynamodb` feature is enabled.
    pub dynamodb_table_name: String,
    /// Log format (default: pretty)
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SURVEY_STORAGE` - `memory`, `sqlite` or `dynamodb`
    /// - `SQLITE_PATH` - SQLite database path (default: "surveyor.db")
    /// - `DYNAMODB_TABLE_NAME` - DynamoDB table name (default: "surveyor")
    /// - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            storage: lookup("SURVEY_STORAGE")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            sqlite_path: lookup("SQLITE_PATH").unwrap_or_else(|| "surveyor.db".to_string()),
            dynamodb_table_name: lookup("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|| "surveyor".to_string()),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
