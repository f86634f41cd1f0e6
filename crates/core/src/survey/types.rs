use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::element::SurveyElement;

/// Identity of one survey revision: the survey GUID plus its creation time.
///
/// Together with the study ID this is the primary key of a revision. Elements
/// reference their revision by these keys alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyKeys {
    pub guid: Uuid,
    pub created_on: DateTime<Utc>,
}

impl SurveyKeys {
    pub fn new(guid: Uuid, created_on: DateTime<Utc>) -> Self {
        Self { guid, created_on }
    }
}

impl fmt::Display for SurveyKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.guid, self.created_on.timestamp_millis())
    }
}

/// Lifecycle state of a single revision. Deletion is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyState {
    Draft,
    Published,
}

/// A survey revision, the aggregate root for its ordered elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub study_id: String,
    /// Assigned on create when absent.
    #[serde(default)]
    pub guid: Option<Uuid>,
    /// Assigned on create; part of the revision identity.
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
    /// Human key, unique per study among surveys that are not deleted.
    pub identifier: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright_notice: Option<String>,
    /// Revision of the derived upload schema. Only set on published surveys
    /// with at least one question.
    #[serde(default)]
    pub schema_revision: Option<u32>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub deleted: bool,
    /// Optimistic-lock counter. `None` until the revision is first stored.
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub elements: Vec<SurveyElement>,
}

impl Survey {
    /// Creates a new, unsaved draft survey.
    pub fn new(
        study_id: impl Into<String>,
        identifier: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            study_id: study_id.into(),
            guid: None,
            created_on: None,
            modified_on: None,
            identifier: identifier.into(),
            name: name.into(),
            copyright_notice: None,
            schema_revision: None,
            published: false,
            deleted: false,
            version: None,
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: SurveyElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_copyright_notice(mut self, notice: impl Into<String>) -> Self {
        self.copyright_notice = Some(notice.into());
        self
    }

    /// Sets a specific identity for this survey (useful for testing).
    pub fn with_keys(mut self, keys: SurveyKeys) -> Self {
        self.guid = Some(keys.guid);
        self.created_on = Some(keys.created_on);
        self
    }

    /// Returns the revision identity once both parts are assigned.
    pub fn keys(&self) -> Option<SurveyKeys> {
        match (self.guid, self.created_on) {
            (Some(guid), Some(created_on)) => Some(SurveyKeys::new(guid, created_on)),
            _ => None,
        }
    }

    pub fn state(&self) -> SurveyState {
        if self.published {
            SurveyState::Published
        } else {
            SurveyState::Draft
        }
    }

    /// Returns true if at least one element is a question.
    pub fn has_questions(&self) -> bool {
        self.elements.iter().any(SurveyElement::is_question)
    }
}
