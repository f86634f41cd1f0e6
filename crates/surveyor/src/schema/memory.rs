use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use surveyor_core::schema::{SchemaBridge, SchemaError};
use surveyor_core::survey::{Survey, SurveyKeys};

#[derive(Debug, Default)]
struct SchemaState {
    /// Current schema revision per study and survey GUID.
    current: HashMap<(String, Uuid), u32>,
    /// Revision handed out to each survey revision.
    cut_for: HashMap<(String, SurveyKeys), u32>,
}

/// Schema bridge that tracks revisions in memory.
///
/// A survey GUID gets revision 1 the first time it is published. Later
/// survey revisions reuse the current schema revision unless a new one is
/// forced. Repeated calls for the same survey revision return what was cut
/// for it the first time.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaBridge {
    state: Arc<RwLock<SchemaState>>,
}

impl InMemorySchemaBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current schema revision of a survey, if any was cut.
    pub async fn current_revision(&self, study_id: &str, guid: Uuid) -> Option<u32> {
        let state = self.state.read().await;
        state.current.get(&(study_id.to_string(), guid)).copied()
    }
}

#[async_trait]
impl SchemaBridge for InMemorySchemaBridge {
    async fn create_or_cut_revision(
        &self,
        study_id: &str,
        survey: &Survey,
        force_new_revision: bool,
    ) -> Result<u32, SchemaError> {
        let keys = survey.keys().ok_or_else(|| {
            SchemaError::Failed(format!(
                "survey {} has no revision identity",
                survey.identifier
            ))
        })?;

        let mut state = self.state.write().await;
        let revision_key = (study_id.to_string(), keys);
        if let Some(revision) = state.cut_for.get(&revision_key) {
            return Ok(*revision);
        }

        let guid_key = (study_id.to_string(), keys.guid);
        let revision = match state.current.get(&guid_key) {
            None => 1,
            Some(current) if force_new_revision => current + 1,
            Some(current) => *current,
        };
        state.current.insert(guid_key, revision);
        state.cut_for.insert(revision_key, revision);

        tracing::debug!(
            study_id,
            guid = %keys.guid,
            schema_revision = revision,
            "Upload schema revision assigned"
        );
        Ok(revision)
    }

    async fn delete_schemas_for_survey(
        &self,
        study_id: &str,
        keys: SurveyKeys,
    ) -> Result<(), SchemaError> {
        let mut state = self.state.write().await;
        if state
            .cut_for
            .remove(&(study_id.to_string(), keys))
            .is_none()
        {
            return Err(SchemaError::NotFound {
                id: keys.to_string(),
            });
        }

        let still_referenced = state
            .cut_for
            .keys()
            .any(|(study, other)| study == study_id && other.guid == keys.guid);
        if !still_referenced {
            state.current.remove(&(study_id.to_string(), keys.guid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn revision(guid: Uuid, created_on: i64) -> Survey {
        Survey::new("study-1", "demographics", "Demographics").with_keys(SurveyKeys::new(
            guid,
            DateTime::from_timestamp_millis(created_on).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_first_publish_gets_revision_one() {
        let bridge = InMemorySchemaBridge::new();
        let survey = revision(Uuid::new_v4(), 1_000);

        let revision = bridge
            .create_or_cut_revision("study-1", &survey, true)
            .await
            .unwrap();

        assert_eq!(revision, 1);
    }

    #[tokio::test]
    async fn test_repeated_call_is_reentrant() {
        let bridge = InMemorySchemaBridge::new();
        let survey = revision(Uuid::new_v4(), 1_000);

        let first = bridge
            .create_or_cut_revision("study-1", &survey, true)
            .await
            .unwrap();
        let second = bridge
            .create_or_cut_revision("study-1", &survey, true)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_new_survey_revision_reuses_or_cuts() {
        let bridge = InMemorySchemaBridge::new();
        let guid = Uuid::new_v4();

        bridge
            .create_or_cut_revision("study-1", &revision(guid, 1_000), false)
            .await
            .unwrap();
        let reused = bridge
            .create_or_cut_revision("study-1", &revision(guid, 2_000), false)
            .await
            .unwrap();
        let cut = bridge
            .create_or_cut_revision("study-1", &revision(guid, 3_000), true)
            .await
            .unwrap();

        assert_eq!(reused, 1);
        assert_eq!(cut, 2);
        assert_eq!(bridge.current_revision("study-1", guid).await, Some(2));
    }

    #[tokio::test]
    async fn test_survey_without_keys_fails() {
        let bridge = InMemorySchemaBridge::new();
        let survey = Survey::new("study-1", "demographics", "Demographics");

        let result = bridge.create_or_cut_revision("study-1", &survey, true).await;

        assert!(matches!(result, Err(SchemaError::Failed(_))));
    }

    #[tokio::test]
    async fn test_delete_schemas_for_survey() {
        let bridge = InMemorySchemaBridge::new();
        let survey = revision(Uuid::new_v4(), 1_000);
        let keys = survey.keys().unwrap();
        bridge
            .create_or_cut_revision("study-1", &survey, true)
            .await
            .unwrap();

        bridge
            .delete_schemas_for_survey("study-1", keys)
            .await
            .unwrap();

        assert_eq!(bridge.current_revision("study-1", keys.guid).await, None);
        let again = bridge.delete_schemas_for_survey("study-1", keys).await;
        assert!(matches!(again, Err(SchemaError::NotFound { .. })));
    }
}
