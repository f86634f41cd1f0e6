//! SQLite schema definitions and SQL query constants.
//!
//! This module contains all SQL statements used by the SQLite repository,
//! following the Functional Core pattern - pure data, no I/O.
//!
//! Timestamps are stored as epoch milliseconds so revision identities
//! compare and sort as integers.

/// SQL statement to create all tables.
pub const CREATE_TABLES: &str = r#"
-- Survey revisions table
CREATE TABLE IF NOT EXISTS surveys (
    study_id TEXT NOT NULL,
    guid TEXT NOT NULL,
    created_on INTEGER NOT NULL,
    modified_on INTEGER,
    identifier TEXT NOT NULL,
    name TEXT NOT NULL,
    copyright_notice TEXT,
    schema_revision INTEGER,
    published INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL,
    PRIMARY KEY (study_id, guid, created_on)
);

-- Survey elements table
CREATE TABLE IF NOT EXISTS survey_elements (
    survey_guid TEXT NOT NULL,
    survey_created_on INTEGER NOT NULL,
    position INTEGER NOT NULL,
    guid TEXT NOT NULL,
    identifier TEXT NOT NULL,
    element_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    before_rules TEXT NOT NULL,
    after_rules TEXT NOT NULL,
    PRIMARY KEY (survey_guid, survey_created_on, position)
);

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_surveys_study_guid ON surveys(study_id, guid, created_on);
CREATE INDEX IF NOT EXISTS idx_surveys_study_identifier ON surveys(study_id, identifier);
"#;

// Survey queries
const SURVEY_COLUMNS: &str = "study_id, guid, created_on, modified_on, identifier, name, \
    copyright_notice, schema_revision, published, deleted, version";

pub const INSERT_SURVEY: &str = r#"
INSERT INTO surveys (study_id, guid, created_on, modified_on, identifier, name,
    copyright_notice, schema_revision, published, deleted, version)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)
"#;

/// Conditional update; affects no rows when the stored version moved on.
pub const UPDATE_SURVEY: &str = r#"
UPDATE surveys
SET modified_on = ?4, identifier = ?5, name = ?6, copyright_notice = ?7,
    schema_revision = ?8, published = ?9, deleted = ?10, version = version + 1
WHERE study_id = ?1 AND guid = ?2 AND created_on = ?3 AND version = ?11
"#;

pub const SOFT_DELETE_SURVEY: &str = r#"
UPDATE surveys
SET deleted = 1, version = version + 1
WHERE study_id = ?1 AND guid = ?2 AND created_on = ?3 AND version = ?4
"#;

pub const DELETE_SURVEY: &str = r#"
DELETE FROM surveys
WHERE study_id = ?1 AND guid = ?2 AND created_on = ?3
"#;

pub fn select_survey_by_keys() -> String {
    format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE study_id = ?1 AND guid = ?2 AND created_on = ?3")
}

/// Revisions of one survey, most recent first. `?3` includes deleted rows.
pub fn select_survey_versions() -> String {
    format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys \
         WHERE study_id = ?1 AND guid = ?2 AND (?3 OR deleted = 0) \
         ORDER BY created_on DESC"
    )
}

/// Like [`select_survey_versions`], restricted to published revisions.
pub fn select_published_survey_versions() -> String {
    format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys \
         WHERE study_id = ?1 AND guid = ?2 AND published = 1 AND (?3 OR deleted = 0) \
         ORDER BY created_on DESC"
    )
}

/// Every revision in a study. `?2` includes deleted rows.
pub fn select_study_surveys() -> String {
    format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys \
         WHERE study_id = ?1 AND (?2 OR deleted = 0)"
    )
}

pub const SELECT_GUID_FOR_IDENTIFIER: &str = r#"
SELECT guid
FROM surveys
WHERE study_id = ?1 AND identifier = ?2 AND (?3 OR deleted = 0)
ORDER BY created_on DESC
LIMIT 1
"#;

// Element queries
pub const INSERT_ELEMENT: &str = r#"
INSERT INTO survey_elements (survey_guid, survey_created_on, position, guid, identifier,
    element_type, payload, before_rules, after_rules)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

pub const SELECT_ELEMENTS: &str = r#"
SELECT survey_guid, survey_created_on, position, guid, identifier, payload,
    before_rules, after_rules
FROM survey_elements
WHERE survey_guid = ?1 AND survey_created_on = ?2
ORDER BY position ASC
"#;

pub const DELETE_ELEMENTS: &str = r#"
DELETE FROM survey_elements
WHERE survey_guid = ?1 AND survey_created_on = ?2
"#;
