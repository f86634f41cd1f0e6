//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and domain types.
//! These are testable in isolation without database access.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use surveyor_core::storage::RepositoryError;
use surveyor_core::survey::{ElementKind, Survey, SurveyElement, SurveyKeys, SurveyRule};

// ============================================================================
// Survey conversions
// ============================================================================

/// Owned column values for writing a survey row.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    pub study_id: String,
    pub guid: String,
    pub created_on: i64,
    pub modified_on: Option<i64>,
    pub identifier: String,
    pub name: String,
    pub copyright_notice: Option<String>,
    pub schema_revision: Option<i64>,
    pub published: bool,
    pub deleted: bool,
    pub version: Option<i64>,
}

impl SurveyRecord {
    /// Builds the record for a survey whose identity is assigned.
    pub fn from_survey(survey: &Survey) -> Result<Self, RepositoryError> {
        let keys = survey.keys().ok_or_else(|| {
            RepositoryError::InvalidData("survey is missing its guid or createdOn".to_string())
        })?;
        Ok(Self {
            study_id: survey.study_id.clone(),
            guid: keys.guid.to_string(),
            created_on: keys.created_on.timestamp_millis(),
            modified_on: survey.modified_on.map(|dt| dt.timestamp_millis()),
            identifier: survey.identifier.clone(),
            name: survey.name.clone(),
            copyright_notice: survey.copyright_notice.clone(),
            schema_revision: survey.schema_revision.map(i64::from),
            published: survey.published,
            deleted: survey.deleted,
            version: survey.version.map(version_to_sql).transpose()?,
        })
    }
}

/// Convert a SQLite row to a Survey.
///
/// Expected columns: study_id, guid, created_on, modified_on, identifier, name,
/// copyright_notice, schema_revision, published, deleted, version
pub fn row_to_survey(row: &Row) -> rusqlite::Result<Survey> {
    let guid: String = row.get(1)?;
    let created_on: i64 = row.get(2)?;
    let modified_on: Option<i64> = row.get(3)?;
    let schema_revision: Option<i64> = row.get(7)?;
    let version: i64 = row.get(10)?;

    Ok(Survey {
        study_id: row.get(0)?,
        guid: Some(parse_uuid(1, &guid)?),
        created_on: Some(parse_millis(2, created_on)?),
        modified_on: modified_on.map(|m| parse_millis(3, m)).transpose()?,
        identifier: row.get(4)?,
        name: row.get(5)?,
        copyright_notice: row.get(6)?,
        schema_revision: schema_revision
            .map(|r| u32::try_from(r).map_err(|e| conversion_error(7, Type::Integer, e)))
            .transpose()?,
        published: row.get(8)?,
        deleted: row.get(9)?,
        version: Some(u64::try_from(version).map_err(|e| conversion_error(10, Type::Integer, e))?),
        elements: Vec::new(),
    })
}

/// Convert a lock version to its SQLite representation.
pub fn version_to_sql(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::InvalidData(format!("version out of range: {version}")))
}

// ============================================================================
// Element conversions
// ============================================================================

/// Owned column values for writing an element row.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    pub position: i64,
    pub guid: String,
    pub identifier: String,
    pub element_type: &'static str,
    pub payload: String,
    pub before_rules: String,
    pub after_rules: String,
}

/// Builds the record for the element stored at `position`.
pub fn element_to_record(
    element: &SurveyElement,
    position: usize,
) -> Result<ElementRecord, RepositoryError> {
    Ok(ElementRecord {
        position: position as i64,
        guid: element.guid.to_string(),
        identifier: element.identifier.clone(),
        element_type: element.kind.type_name(),
        payload: to_json(&element.kind)?,
        before_rules: to_json(&element.before_rules)?,
        after_rules: to_json(&element.after_rules)?,
    })
}

/// Convert a SQLite row to a SurveyElement.
///
/// Expected columns: survey_guid, survey_created_on, position, guid,
/// identifier, payload, before_rules, after_rules
pub fn row_to_element(row: &Row) -> rusqlite::Result<SurveyElement> {
    let survey_guid: String = row.get(0)?;
    let survey_created_on: i64 = row.get(1)?;
    let position: i64 = row.get(2)?;
    let guid: String = row.get(3)?;
    let payload: String = row.get(5)?;
    let before_rules: String = row.get(6)?;
    let after_rules: String = row.get(7)?;

    Ok(SurveyElement {
        guid: parse_uuid(3, &guid)?,
        identifier: row.get(4)?,
        survey_keys: Some(SurveyKeys::new(
            parse_uuid(0, &survey_guid)?,
            parse_millis(1, survey_created_on)?,
        )),
        order: u32::try_from(position).map_err(|e| conversion_error(2, Type::Integer, e))?,
        before_rules: from_json::<Vec<SurveyRule>>(6, &before_rules)?,
        after_rules: from_json::<Vec<SurveyRule>>(7, &after_rules)?,
        kind: from_json::<ElementKind>(5, &payload)?,
    })
}

// ============================================================================
// Helper functions
// ============================================================================

/// Serialize a value to a JSON column.
fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Deserialize a JSON column inside a row conversion.
fn from_json<T: DeserializeOwned>(index: usize, json: &str) -> rusqlite::Result<T> {
    serde_json::from_str(json).map_err(|e| conversion_error(index, Type::Text, e))
}

/// Parse a UUID from string.
fn parse_uuid(index: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_error(index, Type::Text, e))
}

/// Parse a timestamp stored as epoch milliseconds.
fn parse_millis(index: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        conversion_error(
            index,
            Type::Integer,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("timestamp out of range: {millis}"),
            ),
        )
    })
}

fn conversion_error<E>(index: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, ty, Box::new(err))
}
