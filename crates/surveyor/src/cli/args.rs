//! Arguments shared by several commands.

use chrono::{DateTime, Utc};
use clap::Args;
use uuid::Uuid;

use surveyor_core::survey::SurveyKeys;

/// Identifies a survey across all its revisions.
#[derive(Debug, Clone, Args)]
pub struct SurveyArgs {
    /// Study ID.
    #[arg(long)]
    pub study: String,
    /// Survey GUID.
    #[arg(long)]
    pub guid: Uuid,
}

/// Identifies one survey revision.
#[derive(Debug, Clone, Args)]
pub struct RevisionArgs {
    /// Study ID.
    #[arg(long)]
    pub study: String,
    /// Survey GUID.
    #[arg(long)]
    pub guid: Uuid,
    /// Revision creation time, as epoch milliseconds or RFC 3339.
    #[arg(long, value_parser = parse_timestamp)]
    pub created_on: DateTime<Utc>,
}

impl RevisionArgs {
    pub fn keys(&self) -> SurveyKeys {
        SurveyKeys::new(self.guid, self.created_on)
    }
}

/// Parses epoch milliseconds or an RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("timestamp out of range: {value}"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_millis() {
        let parsed = parse_timestamp("1718444400123").unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_718_444_400_123);
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let parsed = parse_timestamp("2024-06-15T09:40:00.123+00:00").unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_718_444_400_123);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
