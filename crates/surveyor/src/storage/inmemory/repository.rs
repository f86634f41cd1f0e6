//! In-memory repository implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use surveyor_core::storage::{ElementRepository, RepositoryError, Result, SurveyRepository};
use surveyor_core::survey::{
    latest_per_guid, select_most_recent, sort_most_recent_first, Survey, SurveyElement,
    SurveyKeys,
};

type SurveyKey = (String, SurveyKeys);

/// In-memory storage backend.
///
/// Uses HashMaps wrapped in `Arc<RwLock<_>>` for thread-safe access.
/// Data is not persisted and will be lost when the repository is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    surveys: Arc<RwLock<HashMap<SurveyKey, Survey>>>,
    elements: Arc<RwLock<HashMap<SurveyKeys, Vec<SurveyElement>>>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self {
            surveys: Arc::new(RwLock::new(HashMap::new())),
            elements: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn revisions_of(&self, study_id: &str, guid: Uuid) -> Vec<Survey> {
        let surveys = self.surveys.read().await;
        surveys
            .iter()
            .filter(|((study, keys), _)| study == study_id && keys.guid == guid)
            .map(|(_, survey)| survey.clone())
            .collect()
    }

    async fn revisions_in_study(&self, study_id: &str) -> Vec<Survey> {
        let surveys = self.surveys.read().await;
        surveys
            .iter()
            .filter(|((study, _), _)| study == study_id)
            .map(|(_, survey)| survey.clone())
            .collect()
    }
}

fn survey_keys(survey: &Survey) -> Result<SurveyKeys> {
    survey.keys().ok_or_else(|| {
        RepositoryError::InvalidData("survey is missing its guid or createdOn".to_string())
    })
}

/// Stored copies never carry elements; those live in their own map.
fn without_elements(survey: &Survey, version: u64) -> Survey {
    Survey {
        elements: Vec::new(),
        version: Some(version),
        ..survey.clone()
    }
}

#[async_trait]
impl SurveyRepository for InMemoryRepository {
    async fn get_survey(&self, study_id: &str, keys: SurveyKeys) -> Result<Option<Survey>> {
        let surveys = self.surveys.read().await;
        Ok(surveys.get(&(study_id.to_string(), keys)).cloned())
    }

    async fn get_most_recent(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>> {
        let revisions = self.revisions_of(study_id, guid).await;
        Ok(select_most_recent(revisions, include_deleted, false))
    }

    async fn get_most_recent_published(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>> {
        let revisions = self.revisions_of(study_id, guid).await;
        Ok(select_most_recent(revisions, include_deleted, true))
    }

    async fn get_all_versions(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let mut revisions: Vec<Survey> = self
            .revisions_of(study_id, guid)
            .await
            .into_iter()
            .filter(|s| include_deleted || !s.deleted)
            .collect();
        sort_most_recent_first(&mut revisions);
        Ok(revisions)
    }

    async fn get_guid_for_identifier(
        &self,
        study_id: &str,
        identifier: &str,
        include_deleted: bool,
    ) -> Result<Option<Uuid>> {
        let surveys = self.surveys.read().await;
        Ok(surveys
            .iter()
            .filter(|((study, _), survey)| study == study_id && survey.identifier == identifier)
            .filter(|(_, survey)| include_deleted || !survey.deleted)
            .max_by_key(|((_, keys), _)| keys.created_on)
            .map(|((_, keys), _)| keys.guid))
    }

    async fn get_all_most_recent(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let revisions = self.revisions_in_study(study_id).await;
        Ok(latest_per_guid(revisions, include_deleted, false))
    }

    async fn get_all_most_recently_published(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let revisions = self.revisions_in_study(study_id).await;
        Ok(latest_per_guid(revisions, include_deleted, true))
    }

    async fn save_survey(&self, survey: &Survey) -> Result<u64> {
        let keys = survey_keys(survey)?;
        let key = (survey.study_id.clone(), keys);
        let mut surveys = self.surveys.write().await;

        let next_version = match (survey.version, surveys.get(&key)) {
            (None, Some(_)) => {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: "Survey",
                    id: keys.to_string(),
                })
            }
            (None, None) => 1,
            (Some(expected), Some(stored)) if stored.version == Some(expected) => expected + 1,
            (Some(_), _) => {
                return Err(RepositoryError::ConcurrentModification {
                    entity_type: "Survey",
                    id: keys.to_string(),
                })
            }
        };

        surveys.insert(key, without_elements(survey, next_version));
        Ok(next_version)
    }

    async fn delete_survey(&self, survey: &Survey) -> Result<u64> {
        let keys = survey_keys(survey)?;
        let key = (survey.study_id.clone(), keys);
        let mut surveys = self.surveys.write().await;

        let Some(stored) = surveys.get_mut(&key) else {
            return Err(RepositoryError::NotFound {
                entity_type: "Survey",
                id: keys.to_string(),
            });
        };
        let Some(expected) = survey.version.filter(|v| stored.version == Some(*v)) else {
            return Err(RepositoryError::ConcurrentModification {
                entity_type: "Survey",
                id: keys.to_string(),
            });
        };

        stored.deleted = true;
        stored.version = Some(expected + 1);
        Ok(expected + 1)
    }

    async fn delete_survey_permanently(&self, study_id: &str, keys: SurveyKeys) -> Result<()> {
        let mut surveys = self.surveys.write().await;
        if surveys.remove(&(study_id.to_string(), keys)).is_none() {
            return Err(RepositoryError::NotFound {
                entity_type: "Survey",
                id: keys.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ElementRepository for InMemoryRepository {
    async fn get_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
    ) -> Result<Vec<SurveyElement>> {
        let elements = self.elements.read().await;
        let mut found = elements
            .get(&SurveyKeys::new(survey_guid, created_on))
            .cloned()
            .unwrap_or_default();
        found.sort_by_key(|e| e.order);
        Ok(found)
    }

    async fn replace_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
        elements: &[SurveyElement],
    ) -> Result<()> {
        let keys = SurveyKeys::new(survey_guid, created_on);
        let stored: Vec<SurveyElement> = elements
            .iter()
            .enumerate()
            .map(|(index, element)| SurveyElement {
                survey_keys: Some(keys),
                order: index as u32,
                ..element.clone()
            })
            .collect();

        let mut map = self.elements.write().await;
        map.insert(keys, stored);
        Ok(())
    }

    async fn delete_elements(&self, survey_guid: Uuid, created_on: DateTime<Utc>) -> Result<()> {
        let mut elements = self.elements.write().await;
        elements.remove(&SurveyKeys::new(survey_guid, created_on));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_core::survey::{Constraints, DataType};

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn revision(guid: Uuid, created_on: i64) -> Survey {
        Survey::new("study-1", "demographics", "Demographics")
            .with_keys(SurveyKeys::new(guid, ts(created_on)))
    }

    #[tokio::test]
    async fn test_insert_starts_at_version_one() {
        let repo = InMemoryRepository::new();
        let survey = revision(Uuid::new_v4(), 1_000);

        let version = repo.save_survey(&survey).await.unwrap();

        assert_eq!(version, 1);
        let stored = repo
            .get_survey("study-1", survey.keys().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, Some(1));
    }

    #[tokio::test]
    async fn test_insert_twice_is_already_exists() {
        let repo = InMemoryRepository::new();
        let survey = revision(Uuid::new_v4(), 1_000);
        repo.save_survey(&survey).await.unwrap();

        let result = repo.save_survey(&survey).await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_is_rejected() {
        let repo = InMemoryRepository::new();
        let mut survey = revision(Uuid::new_v4(), 1_000);
        survey.version = Some(repo.save_survey(&survey).await.unwrap());
        let stale = survey.clone();

        survey.name = "Renamed".to_string();
        assert_eq!(repo.save_survey(&survey).await.unwrap(), 2);

        let result = repo.save_survey(&stale).await;
        assert!(matches!(
            result,
            Err(RepositoryError::ConcurrentModification { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_concurrent_modification() {
        let repo = InMemoryRepository::new();
        let mut survey = revision(Uuid::new_v4(), 1_000);
        survey.version = Some(3);

        let result = repo.save_survey(&survey).await;

        assert!(matches!(
            result,
            Err(RepositoryError::ConcurrentModification { .. })
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_bumps_version_and_hides_revision() {
        let repo = InMemoryRepository::new();
        let mut survey = revision(Uuid::new_v4(), 1_000);
        let guid = survey.guid.unwrap();
        survey.version = Some(repo.save_survey(&survey).await.unwrap());

        let version = repo.delete_survey(&survey).await.unwrap();

        assert_eq!(version, 2);
        assert!(repo
            .get_most_recent("study-1", guid, false)
            .await
            .unwrap()
            .is_none());
        let deleted = repo.get_most_recent("study-1", guid, true).await.unwrap();
        assert!(deleted.unwrap().deleted);
    }

    #[tokio::test]
    async fn test_get_all_versions_most_recent_first() {
        let repo = InMemoryRepository::new();
        let guid = Uuid::new_v4();
        for created_on in [1_000, 3_000, 2_000] {
            repo.save_survey(&revision(guid, created_on)).await.unwrap();
        }

        let versions = repo.get_all_versions("study-1", guid, false).await.unwrap();

        let order: Vec<_> = versions.iter().map(|s| s.created_on).collect();
        assert_eq!(order, vec![Some(ts(3_000)), Some(ts(2_000)), Some(ts(1_000))]);
    }

    #[tokio::test]
    async fn test_guid_for_identifier_skips_deleted() {
        let repo = InMemoryRepository::new();
        let mut survey = revision(Uuid::new_v4(), 1_000);
        survey.version = Some(repo.save_survey(&survey).await.unwrap());
        repo.delete_survey(&survey).await.unwrap();

        let visible = repo
            .get_guid_for_identifier("study-1", "demographics", false)
            .await
            .unwrap();
        let admin = repo
            .get_guid_for_identifier("study-1", "demographics", true)
            .await
            .unwrap();

        assert_eq!(visible, None);
        assert_eq!(admin, survey.guid);
    }

    #[tokio::test]
    async fn test_studies_are_isolated() {
        let repo = InMemoryRepository::new();
        let survey = revision(Uuid::new_v4(), 1_000);
        repo.save_survey(&survey).await.unwrap();

        let other = repo
            .get_survey("study-2", survey.keys().unwrap())
            .await
            .unwrap();

        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_saved_survey_drops_elements() {
        let repo = InMemoryRepository::new();
        let survey = revision(Uuid::new_v4(), 1_000).with_element(SurveyElement::question(
            "age",
            "Age?",
            Constraints::new(DataType::Integer),
        ));
        repo.save_survey(&survey).await.unwrap();

        let stored = repo
            .get_survey("study-1", survey.keys().unwrap())
            .await
            .unwrap()
            .unwrap();

        assert!(stored.elements.is_empty());
    }

    #[tokio::test]
    async fn test_delete_permanently_missing_is_not_found() {
        let repo = InMemoryRepository::new();
        let keys = SurveyKeys::new(Uuid::new_v4(), ts(1_000));

        let result = repo.delete_survey_permanently("study-1", keys).await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_replace_elements_renumbers_and_replaces() {
        let repo = InMemoryRepository::new();
        let guid = Uuid::new_v4();
        let first = vec![
            SurveyElement::info_screen("intro", "Welcome", "Hello"),
            SurveyElement::question("q1", "Q1?", Constraints::new(DataType::String)),
        ];
        repo.replace_elements(guid, ts(1_000), &first).await.unwrap();

        let second = vec![SurveyElement::question(
            "q2",
            "Q2?",
            Constraints::new(DataType::Boolean),
        )];
        repo.replace_elements(guid, ts(1_000), &second).await.unwrap();

        let stored = repo.get_elements(guid, ts(1_000)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].identifier, "q2");
        assert_eq!(stored[0].order, 0);
        assert_eq!(
            stored[0].survey_keys,
            Some(SurveyKeys::new(guid, ts(1_000)))
        );
    }

    #[tokio::test]
    async fn test_delete_elements_is_idempotent() {
        let repo = InMemoryRepository::new();
        let guid = Uuid::new_v4();

        repo.delete_elements(guid, ts(1_000)).await.unwrap();
        repo.delete_elements(guid, ts(1_000)).await.unwrap();

        assert!(repo.get_elements(guid, ts(1_000)).await.unwrap().is_empty());
    }
}
