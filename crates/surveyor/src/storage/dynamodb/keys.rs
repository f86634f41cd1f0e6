//! DynamoDB key generation functions.
//!
//! Pure functions for generating partition and sort keys following the single-table design.
//! All functions are sync and have no side effects.
//!
//! | Item        | PK                             | SK                      |
//! |-------------|--------------------------------|-------------------------|
//! | Survey      | `STUDY#<study>#SURVEY#<guid>`  | `REV#<created_on>`      |
//! | Element     | `SURVEY#<guid>#REV#<created_on>` | `ELEM#<order>#<guid>` |
//!
//! GSI1 lists every revision in a study (`STUDY#<study>` /
//! `SURVEY#<guid>#REV#<created_on>`); GSI2 resolves identifiers
//! (`STUDY#<study>#IDENT#<identifier>` / `REV#<created_on>`).
//!
//! Timestamps are zero-padded epoch milliseconds so sort keys order
//! chronologically.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// Key prefixes
// ============================================================================

pub const STUDY_PREFIX: &str = "STUDY#";
pub const SURVEY_PREFIX: &str = "SURVEY#";
pub const REVISION_PREFIX: &str = "REV#";
pub const IDENTIFIER_PREFIX: &str = "IDENT#";
pub const ELEMENT_PREFIX: &str = "ELEM#";

fn millis(created_on: DateTime<Utc>) -> String {
    format!("{:013}", created_on.timestamp_millis())
}

// ============================================================================
// Survey keys
// ============================================================================

/// Generate primary key for all revisions of a survey.
///
/// Pattern: `STUDY#<study_id>#SURVEY#<guid>`
pub fn survey_pk(study_id: &str, guid: Uuid) -> String {
    format!("{STUDY_PREFIX}{study_id}#{SURVEY_PREFIX}{guid}")
}

/// Generate sort key for one survey revision.
///
/// Pattern: `REV#<created_on millis>`
pub fn revision_sk(created_on: DateTime<Utc>) -> String {
    format!("{REVISION_PREFIX}{}", millis(created_on))
}

/// Generate GSI1 partition key for listing a study's surveys.
///
/// Pattern: `STUDY#<study_id>`
pub fn survey_gsi1_pk(study_id: &str) -> String {
    format!("{STUDY_PREFIX}{study_id}")
}

/// Generate GSI1 sort key for a survey revision.
///
/// Pattern: `SURVEY#<guid>#REV#<created_on millis>`
pub fn survey_gsi1_sk(guid: Uuid, created_on: DateTime<Utc>) -> String {
    format!("{SURVEY_PREFIX}{guid}#{}", revision_sk(created_on))
}

/// Generate GSI2 partition key for identifier lookup.
///
/// Pattern: `STUDY#<study_id>#IDENT#<identifier>`
pub fn survey_gsi2_pk(study_id: &str, identifier: &str) -> String {
    format!("{STUDY_PREFIX}{study_id}#{IDENTIFIER_PREFIX}{identifier}")
}

/// Generate GSI2 sort key for identifier lookup (newest revision sorts last).
///
/// Pattern: `REV#<created_on millis>`
pub fn survey_gsi2_sk(created_on: DateTime<Utc>) -> String {
    revision_sk(created_on)
}

// ============================================================================
// Element keys
// ============================================================================

/// Generate primary key for the elements of one survey revision.
///
/// Pattern: `SURVEY#<guid>#REV#<created_on millis>`
pub fn element_pk(survey_guid: Uuid, created_on: DateTime<Utc>) -> String {
    format!("{SURVEY_PREFIX}{survey_guid}#{}", revision_sk(created_on))
}

/// Generate sort key for an element at a position.
///
/// Pattern: `ELEM#<order>#<guid>`
pub fn element_sk(order: u32, guid: Uuid) -> String {
    format!("{ELEMENT_PREFIX}{order:04}#{guid}")
}

/// Generate the sort key prefix for querying all elements of a revision.
///
/// Pattern: `ELEM#`
pub fn element_sk_prefix() -> &'static str {
    ELEMENT_PREFIX
}

/// Generate the sort key prefix for querying all revisions of a survey.
///
/// Pattern: `REV#`
pub fn revision_sk_prefix() -> &'static str {
    REVISION_PREFIX
}
