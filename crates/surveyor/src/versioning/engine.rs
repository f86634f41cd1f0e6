use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use surveyor_core::schema::{SchemaBridge, SchemaError};
use surveyor_core::storage::{ElementRepository, SurveyRepository};
use surveyor_core::survey::{
    next_revision_timestamp, now_millis, prepare_elements, regenerate_element_guids, Result,
    Survey, SurveyError, SurveyKeys,
};

use super::compensation::write_survey;
use crate::schema::InMemorySchemaBridge;
use crate::storage::InMemoryRepository;

/// Orchestrates every write to survey revisions.
///
/// Holds repository trait objects so any backend combination can be plugged
/// in. Writes go through [`write_survey`], which stores elements before the
/// survey row and restores them if the row cannot be saved.
#[derive(Clone)]
pub struct VersioningEngine {
    surveys: Arc<dyn SurveyRepository>,
    elements: Arc<dyn ElementRepository>,
    schemas: Arc<dyn SchemaBridge>,
}

impl VersioningEngine {
    pub fn new(
        surveys: Arc<dyn SurveyRepository>,
        elements: Arc<dyn ElementRepository>,
        schemas: Arc<dyn SchemaBridge>,
    ) -> Self {
        Self {
            surveys,
            elements,
            schemas,
        }
    }

    /// Creates an engine backed by in-memory storage and schemas.
    pub fn in_memory() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        Self::new(
            repo.clone(),
            repo,
            Arc::new(InMemorySchemaBridge::new()),
        )
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Stores a new survey revision as an unpublished draft.
    ///
    /// Assigns a GUID when missing and stamps `created_on` and `modified_on`
    /// with the current time. Fails with `AlreadyExists` if another survey
    /// in the study uses the identifier.
    pub async fn create(&self, mut survey: Survey) -> Result<Survey> {
        if survey.study_id.trim().is_empty() {
            return Err(SurveyError::InvalidState(
                "survey must belong to a study".to_string(),
            ));
        }

        let guid = *survey.guid.get_or_insert_with(Uuid::new_v4);
        let existing = self
            .surveys
            .get_guid_for_identifier(&survey.study_id, &survey.identifier, false)
            .await?;
        if existing.is_some_and(|other| other != guid) {
            return Err(SurveyError::AlreadyExists {
                entity_type: "Survey",
                id: survey.identifier,
            });
        }

        self.insert_revision(survey, now_millis()).await
    }

    /// Edits an unpublished revision in place.
    ///
    /// Only `name`, `elements`, `copyright_notice` and `deleted` are taken
    /// from the caller. The caller's `version` must match the stored one.
    pub async fn update(&self, study_id: &str, survey: Survey) -> Result<Survey> {
        let (Some(keys), Some(version)) = (survey.keys(), survey.version) else {
            return Err(SurveyError::InvalidState(
                "survey update requires guid, createdOn and version".to_string(),
            ));
        };

        let mut stored = self
            .surveys
            .get_survey(study_id, keys)
            .await?
            .ok_or_else(|| SurveyError::survey_not_found(keys.to_string()))?;
        if stored.published {
            return Err(SurveyError::InvalidState(format!(
                "survey {keys} is published and cannot be edited"
            )));
        }

        stored.name = survey.name;
        stored.elements = survey.elements;
        stored.copyright_notice = survey.copyright_notice;
        stored.deleted = survey.deleted;
        stored.version = Some(version);
        stored.modified_on = Some(now_millis());
        stored.schema_revision = None;

        self.persist(stored).await
    }

    /// Branches a new draft revision off an existing one.
    ///
    /// The source is left untouched. The copy gets a later `created_on`,
    /// fresh element GUIDs and no schema revision. Deleted revisions can be
    /// branched even when their identifier now belongs to another survey.
    pub async fn version_survey(&self, study_id: &str, keys: SurveyKeys) -> Result<Survey> {
        let source = self.load_with_elements(study_id, keys).await?;

        let created_on = next_revision_timestamp(now_millis(), keys.created_on);
        let mut copy = source;
        regenerate_element_guids(&mut copy.elements);

        let branched = self.insert_revision(copy, created_on).await?;
        tracing::info!(
            study_id,
            guid = %keys.guid,
            source_created_on = %keys.created_on,
            created_on = %created_on,
            "Survey branched"
        );
        Ok(branched)
    }

    /// Publishes a revision, cutting an upload schema when it has questions.
    ///
    /// Publishing a published revision returns it as stored without touching
    /// the schema bridge.
    pub async fn publish(
        &self,
        study_id: &str,
        survey: &Survey,
        cut_new_schema_revision: bool,
    ) -> Result<Survey> {
        let keys = survey.keys().ok_or_else(|| {
            SurveyError::InvalidState("survey publish requires guid and createdOn".to_string())
        })?;

        let mut stored = self.load_with_elements(study_id, keys).await?;
        if stored.published {
            tracing::debug!(study_id, guid = %keys.guid, "Survey already published");
            return Ok(stored);
        }

        stored.published = true;
        stored.modified_on = Some(now_millis());
        if stored.has_questions() {
            let revision = self
                .schemas
                .create_or_cut_revision(study_id, &stored, cut_new_schema_revision)
                .await?;
            stored.schema_revision = Some(revision);
        }
        if survey.version.is_some() {
            stored.version = survey.version;
        }

        let schema_revision = stored.schema_revision;
        match self.persist(stored).await {
            Ok(published) => {
                tracing::info!(
                    study_id,
                    guid = %keys.guid,
                    created_on = %keys.created_on,
                    version = published.version,
                    schema_revision = published.schema_revision,
                    "Survey published"
                );
                Ok(published)
            }
            Err(err) => {
                if let Some(revision) = schema_revision {
                    tracing::warn!(
                        study_id,
                        guid = %keys.guid,
                        created_on = %keys.created_on,
                        schema_revision = revision,
                        "Upload schema revision cut for a survey that failed to publish"
                    );
                }
                Err(err)
            }
        }
    }

    /// Soft-deletes a revision under the optimistic lock.
    pub async fn delete(&self, survey: &Survey) -> Result<Survey> {
        let (Some(keys), Some(_)) = (survey.keys(), survey.version) else {
            return Err(SurveyError::InvalidState(
                "survey delete requires guid, createdOn and version".to_string(),
            ));
        };

        let version = self.surveys.delete_survey(survey).await?;
        tracing::debug!(
            study_id = %survey.study_id,
            guid = %keys.guid,
            created_on = %keys.created_on,
            version,
            "Survey deleted"
        );

        self.load_with_elements(&survey.study_id, keys).await
    }

    /// Removes a revision, its elements and its upload schemas for good.
    ///
    /// Purging a revision that does not exist succeeds without doing anything.
    pub async fn delete_survey_permanently(&self, study_id: &str, keys: SurveyKeys) -> Result<()> {
        if self.surveys.get_survey(study_id, keys).await?.is_none() {
            tracing::debug!(study_id, guid = %keys.guid, "No survey to purge");
            return Ok(());
        }

        self.elements
            .delete_elements(keys.guid, keys.created_on)
            .await?;
        self.surveys
            .delete_survey_permanently(study_id, keys)
            .await?;

        match self.schemas.delete_schemas_for_survey(study_id, keys).await {
            Ok(()) => {}
            Err(SchemaError::NotFound { .. }) => {
                tracing::warn!(
                    study_id,
                    guid = %keys.guid,
                    created_on = %keys.created_on,
                    "No upload schema to delete for purged survey"
                );
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            study_id,
            guid = %keys.guid,
            created_on = %keys.created_on,
            "Survey purged"
        );
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_survey(
        &self,
        study_id: &str,
        keys: SurveyKeys,
        include_elements: bool,
    ) -> Result<Survey> {
        if include_elements {
            return self.load_with_elements(study_id, keys).await;
        }
        self.surveys
            .get_survey(study_id, keys)
            .await?
            .ok_or_else(|| SurveyError::survey_not_found(keys.to_string()))
    }

    /// Most recent non-deleted revision, published or not, with elements.
    pub async fn get_survey_most_recent_version(
        &self,
        study_id: &str,
        guid: Uuid,
    ) -> Result<Survey> {
        let survey = self
            .surveys
            .get_most_recent(study_id, guid, false)
            .await?
            .ok_or_else(|| SurveyError::survey_not_found(guid.to_string()))?;
        self.attach_elements(survey).await
    }

    pub async fn get_survey_most_recently_published_version(
        &self,
        study_id: &str,
        guid: Uuid,
        include_elements: bool,
    ) -> Result<Survey> {
        let survey = self
            .surveys
            .get_most_recent_published(study_id, guid, false)
            .await?
            .ok_or_else(|| SurveyError::survey_not_found(guid.to_string()))?;
        if include_elements {
            return self.attach_elements(survey).await;
        }
        Ok(survey)
    }

    /// All revisions of a survey, most recent first.
    pub async fn get_survey_all_versions(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let versions = self
            .surveys
            .get_all_versions(study_id, guid, include_deleted)
            .await?;
        if versions.is_empty() {
            return Err(SurveyError::survey_not_found(guid.to_string()));
        }
        Ok(versions)
    }

    /// Resolves an identifier to its survey GUID, ignoring deleted surveys.
    pub async fn get_survey_guid_for_identifier(
        &self,
        study_id: &str,
        identifier: &str,
    ) -> Result<Uuid> {
        self.lookup_identifier(study_id, identifier, false).await
    }

    /// Full-access identifier lookup that also sees deleted surveys.
    pub async fn admin_get_survey_guid_for_identifier(
        &self,
        study_id: &str,
        identifier: &str,
    ) -> Result<Uuid> {
        self.lookup_identifier(study_id, identifier, true).await
    }

    pub async fn get_all_surveys_most_recent_version(&self, study_id: &str) -> Result<Vec<Survey>> {
        Ok(self.surveys.get_all_most_recent(study_id, false).await?)
    }

    pub async fn get_all_surveys_most_recently_published_version(
        &self,
        study_id: &str,
    ) -> Result<Vec<Survey>> {
        Ok(self
            .surveys
            .get_all_most_recently_published(study_id, false)
            .await?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Writes `survey` as a fresh draft revision stamped at `created_on`.
    async fn insert_revision(
        &self,
        mut survey: Survey,
        created_on: DateTime<Utc>,
    ) -> Result<Survey> {
        let created_on = created_on.trunc_subsecs(3);
        survey.created_on = Some(created_on);
        survey.modified_on = Some(created_on);
        survey.schema_revision = None;
        survey.published = false;
        survey.deleted = false;
        survey.version = None;

        self.persist(survey).await
    }

    /// Normalizes elements and runs the two-phase write.
    async fn persist(&self, mut survey: Survey) -> Result<Survey> {
        let keys = survey.keys().ok_or_else(|| {
            SurveyError::InvalidState("survey is missing its guid or createdOn".to_string())
        })?;
        prepare_elements(&mut survey.elements, keys);

        let version =
            write_survey(self.surveys.as_ref(), self.elements.as_ref(), keys, &survey).await?;
        survey.version = Some(version);

        tracing::debug!(
            study_id = %survey.study_id,
            guid = %keys.guid,
            created_on = %keys.created_on,
            version,
            "Survey saved"
        );
        Ok(survey)
    }

    async fn load_with_elements(&self, study_id: &str, keys: SurveyKeys) -> Result<Survey> {
        let survey = self
            .surveys
            .get_survey(study_id, keys)
            .await?
            .ok_or_else(|| SurveyError::survey_not_found(keys.to_string()))?;
        self.attach_elements(survey).await
    }

    async fn attach_elements(&self, mut survey: Survey) -> Result<Survey> {
        if let Some(keys) = survey.keys() {
            survey.elements = self
                .elements
                .get_elements(keys.guid, keys.created_on)
                .await?;
        }
        Ok(survey)
    }

    async fn lookup_identifier(
        &self,
        study_id: &str,
        identifier: &str,
        include_deleted: bool,
    ) -> Result<Uuid> {
        self.surveys
            .get_guid_for_identifier(study_id, identifier, include_deleted)
            .await?
            .ok_or_else(|| SurveyError::survey_not_found(identifier))
    }
}
