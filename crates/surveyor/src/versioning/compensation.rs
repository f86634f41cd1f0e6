//! Two-phase write of a survey revision and its elements.
//!
//! Elements and the survey row live in separate stores with no shared
//! transaction. Elements are written first, then the survey. If the survey
//! save fails, the element set that was stored before the write is put
//! back: removed entirely when there was none, replaced otherwise.

use surveyor_core::storage::{ElementRepository, RepositoryError, SurveyRepository};
use surveyor_core::survey::{Result, Survey, SurveyElement, SurveyKeys};

/// Writes `survey.elements` then the survey row, returning the new lock version.
///
/// On a failed survey save the original error is returned even if restoring
/// the elements fails too; that second failure is only logged.
pub(crate) async fn write_survey(
    surveys: &dyn SurveyRepository,
    elements: &dyn ElementRepository,
    keys: SurveyKeys,
    survey: &Survey,
) -> Result<u64> {
    let previous = elements.get_elements(keys.guid, keys.created_on).await?;

    elements
        .replace_elements(keys.guid, keys.created_on, &survey.elements)
        .await?;

    match surveys.save_survey(survey).await {
        Ok(version) => Ok(version),
        Err(err) => {
            tracing::warn!(
                study_id = %survey.study_id,
                guid = %keys.guid,
                created_on = %keys.created_on,
                error = %err,
                "Survey save failed, restoring previous elements"
            );
            if let Err(restore_err) = restore_elements(elements, keys, &previous).await {
                tracing::error!(
                    study_id = %survey.study_id,
                    guid = %keys.guid,
                    created_on = %keys.created_on,
                    error = %restore_err,
                    "Failed to restore elements after survey save failure"
                );
            }
            Err(err.into())
        }
    }
}

async fn restore_elements(
    elements: &dyn ElementRepository,
    keys: SurveyKeys,
    previous: &[SurveyElement],
) -> std::result::Result<(), RepositoryError> {
    if previous.is_empty() {
        elements.delete_elements(keys.guid, keys.created_on).await
    } else {
        elements
            .replace_elements(keys.guid, keys.created_on, previous)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRepository;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use surveyor_core::survey::{Constraints, DataType, SurveyError};
    use uuid::Uuid;

    /// Element store whose writes always fail.
    struct BrokenElements;

    #[async_trait]
    impl ElementRepository for BrokenElements {
        async fn get_elements(
            &self,
            _survey_guid: Uuid,
            _created_on: DateTime<Utc>,
        ) -> surveyor_core::storage::Result<Vec<SurveyElement>> {
            Ok(Vec::new())
        }

        async fn replace_elements(
            &self,
            _survey_guid: Uuid,
            _created_on: DateTime<Utc>,
            _elements: &[SurveyElement],
        ) -> surveyor_core::storage::Result<()> {
            Err(RepositoryError::QueryFailed("disk full".to_string()))
        }

        async fn delete_elements(
            &self,
            _survey_guid: Uuid,
            _created_on: DateTime<Utc>,
        ) -> surveyor_core::storage::Result<()> {
            Err(RepositoryError::QueryFailed("disk full".to_string()))
        }
    }

    fn draft(keys: SurveyKeys) -> Survey {
        Survey::new("study-1", "demographics", "Demographics")
            .with_keys(keys)
            .with_element(SurveyElement::question(
                "age",
                "Age?",
                Constraints::new(DataType::Integer),
            ))
    }

    #[tokio::test]
    async fn test_write_survey_stores_both_parts() {
        let repo = InMemoryRepository::new();
        let keys = SurveyKeys::new(Uuid::new_v4(), Utc::now());
        let survey = draft(keys);

        let version = write_survey(&repo, &repo, keys, &survey).await.unwrap();

        assert_eq!(version, 1);
        let stored = repo.get_elements(keys.guid, keys.created_on).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_element_failure_skips_survey_save() {
        let repo = InMemoryRepository::new();
        let keys = SurveyKeys::new(Uuid::new_v4(), Utc::now());

        let result = write_survey(&repo, &BrokenElements, keys, &draft(keys)).await;

        assert!(matches!(result, Err(SurveyError::StorageFailure(_))));
        assert!(repo.get_survey("study-1", keys).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_save_removes_new_elements() {
        let repo = InMemoryRepository::new();
        let keys = SurveyKeys::new(Uuid::new_v4(), Utc::now());
        let mut stale = draft(keys);
        stale.version = Some(7);

        let result = write_survey(&repo, &repo, keys, &stale).await;

        assert!(matches!(
            result,
            Err(SurveyError::ConcurrentModification { .. })
        ));
        let stored = repo.get_elements(keys.guid, keys.created_on).await.unwrap();
        assert!(stored.is_empty());
    }
}
