//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and domain types.
//! These are testable in isolation without DynamoDB access.

use std::collections::HashMap;
use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use surveyor_core::storage::RepositoryError;
use surveyor_core::survey::{Survey, SurveyElement, SurveyKeys};

use super::keys;

pub type Item = HashMap<String, AttributeValue>;

// ============================================================================
// Entity type constants
// ============================================================================

pub const ENTITY_TYPE_SURVEY: &str = "SURVEY";
pub const ENTITY_TYPE_ELEMENT: &str = "ELEMENT";

// ============================================================================
// Survey conversions
// ============================================================================

/// Convert a Survey to a DynamoDB item stored at `version`.
///
/// Elements are not part of the item.
pub fn survey_to_item(survey: &Survey, version: u64) -> Result<Item, RepositoryError> {
    let survey_keys = survey.keys().ok_or_else(|| {
        RepositoryError::InvalidData("survey is missing its guid or createdOn".to_string())
    })?;
    let mut item = HashMap::new();

    // Keys
    item.insert(
        "PK".to_string(),
        AttributeValue::S(keys::survey_pk(&survey.study_id, survey_keys.guid)),
    );
    item.insert(
        "SK".to_string(),
        AttributeValue::S(keys::revision_sk(survey_keys.created_on)),
    );
    item.insert(
        "GSI1PK".to_string(),
        AttributeValue::S(keys::survey_gsi1_pk(&survey.study_id)),
    );
    item.insert(
        "GSI1SK".to_string(),
        AttributeValue::S(keys::survey_gsi1_sk(
            survey_keys.guid,
            survey_keys.created_on,
        )),
    );
    item.insert(
        "GSI2PK".to_string(),
        AttributeValue::S(keys::survey_gsi2_pk(&survey.study_id, &survey.identifier)),
    );
    item.insert(
        "GSI2SK".to_string(),
        AttributeValue::S(keys::survey_gsi2_sk(survey_keys.created_on)),
    );

    // Entity type
    item.insert(
        "entityType".to_string(),
        AttributeValue::S(ENTITY_TYPE_SURVEY.to_string()),
    );

    // Data
    item.insert(
        "studyId".to_string(),
        AttributeValue::S(survey.study_id.clone()),
    );
    item.insert(
        "guid".to_string(),
        AttributeValue::S(survey_keys.guid.to_string()),
    );
    item.insert(
        "createdOn".to_string(),
        millis_attribute(survey_keys.created_on),
    );
    if let Some(modified_on) = survey.modified_on {
        item.insert("modifiedOn".to_string(), millis_attribute(modified_on));
    }
    item.insert(
        "identifier".to_string(),
        AttributeValue::S(survey.identifier.clone()),
    );
    item.insert("name".to_string(), AttributeValue::S(survey.name.clone()));
    if let Some(notice) = &survey.copyright_notice {
        item.insert(
            "copyrightNotice".to_string(),
            AttributeValue::S(notice.clone()),
        );
    }
    if let Some(revision) = survey.schema_revision {
        item.insert(
            "schemaRevision".to_string(),
            AttributeValue::N(revision.to_string()),
        );
    }
    item.insert("published".to_string(), AttributeValue::Bool(survey.published));
    item.insert("deleted".to_string(), AttributeValue::Bool(survey.deleted));
    item.insert("version".to_string(), AttributeValue::N(version.to_string()));

    Ok(item)
}

/// Convert a DynamoDB item to Survey (without elements).
pub fn item_to_survey(item: &Item) -> Result<Survey, RepositoryError> {
    Ok(Survey {
        study_id: get_string(item, "studyId")?,
        guid: Some(get_uuid(item, "guid")?),
        created_on: Some(get_millis(item, "createdOn")?),
        modified_on: get_optional_number::<i64>(item, "modifiedOn")?
            .map(|m| millis_to_datetime("modifiedOn", m))
            .transpose()?,
        identifier: get_string(item, "identifier")?,
        name: get_string(item, "name")?,
        copyright_notice: get_optional_string(item, "copyrightNotice"),
        schema_revision: get_optional_number(item, "schemaRevision")?,
        published: get_bool(item, "published")?,
        deleted: get_bool(item, "deleted")?,
        version: Some(get_number(item, "version")?),
        elements: Vec::new(),
    })
}

// ============================================================================
// Element conversions
// ============================================================================

/// Convert a SurveyElement at `position` to a DynamoDB item.
pub fn element_to_item(
    element: &SurveyElement,
    survey_keys: SurveyKeys,
    position: u32,
) -> Result<Item, RepositoryError> {
    let mut item = HashMap::new();

    // Keys
    item.insert(
        "PK".to_string(),
        AttributeValue::S(keys::element_pk(survey_keys.guid, survey_keys.created_on)),
    );
    item.insert(
        "SK".to_string(),
        AttributeValue::S(keys::element_sk(position, element.guid)),
    );

    // Entity type
    item.insert(
        "entityType".to_string(),
        AttributeValue::S(ENTITY_TYPE_ELEMENT.to_string()),
    );

    // Data
    item.insert(
        "guid".to_string(),
        AttributeValue::S(element.guid.to_string()),
    );
    item.insert(
        "surveyGuid".to_string(),
        AttributeValue::S(survey_keys.guid.to_string()),
    );
    item.insert(
        "surveyCreatedOn".to_string(),
        millis_attribute(survey_keys.created_on),
    );
    item.insert("order".to_string(), AttributeValue::N(position.to_string()));
    item.insert(
        "identifier".to_string(),
        AttributeValue::S(element.identifier.clone()),
    );
    item.insert(
        "elementType".to_string(),
        AttributeValue::S(element.kind.type_name().to_string()),
    );
    item.insert("payload".to_string(), AttributeValue::S(to_json(&element.kind)?));
    item.insert(
        "beforeRules".to_string(),
        AttributeValue::S(to_json(&element.before_rules)?),
    );
    item.insert(
        "afterRules".to_string(),
        AttributeValue::S(to_json(&element.after_rules)?),
    );

    Ok(item)
}

/// Convert a DynamoDB item to SurveyElement.
pub fn item_to_element(item: &Item) -> Result<SurveyElement, RepositoryError> {
    Ok(SurveyElement {
        guid: get_uuid(item, "guid")?,
        identifier: get_string(item, "identifier")?,
        survey_keys: Some(SurveyKeys::new(
            get_uuid(item, "surveyGuid")?,
            get_millis(item, "surveyCreatedOn")?,
        )),
        order: get_number(item, "order")?,
        before_rules: from_json(item, "beforeRules")?,
        after_rules: from_json(item, "afterRules")?,
        kind: from_json(item, "payload")?,
    })
}

// ============================================================================
// Helper functions
// ============================================================================

fn millis_attribute(dt: DateTime<Utc>) -> AttributeValue {
    AttributeValue::N(dt.timestamp_millis().to_string())
}

fn millis_to_datetime(key: &str, millis: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid timestamp {key}: {millis}")))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(item: &Item, key: &str) -> Result<T, RepositoryError> {
    let s = get_string(item, key)?;
    serde_json::from_str(&s)
        .map_err(|e| RepositoryError::Serialization(format!("Invalid JSON {key}: {e}")))
}

/// Get a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

/// Get an optional string attribute.
fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// Get a required UUID attribute.
fn get_uuid(item: &Item, key: &str) -> Result<Uuid, RepositoryError> {
    let s = get_string(item, key)?;
    Uuid::parse_str(&s)
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid UUID {}: {}", key, e)))
}

/// Get a required numeric attribute.
fn get_number<T: FromStr>(item: &Item, key: &str) -> Result<T, RepositoryError> {
    get_optional_number(item, key)?
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

/// Get an optional numeric attribute. Present but unparsable is an error.
fn get_optional_number<T: FromStr>(item: &Item, key: &str) -> Result<Option<T>, RepositoryError> {
    match item.get(key).and_then(|v| v.as_n().ok()) {
        Some(n) => n
            .parse()
            .map(Some)
            .map_err(|_| RepositoryError::InvalidData(format!("Invalid number {}: {}", key, n))),
        None => Ok(None),
    }
}

/// Get a required boolean attribute.
fn get_bool(item: &Item, key: &str) -> Result<bool, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

/// Get a required timestamp attribute stored as epoch milliseconds.
fn get_millis(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    millis_to_datetime(key, get_number(item, key)?)
}
