use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::survey::{Survey, SurveyElement, SurveyKeys};

use super::Result;

/// Repository for survey revisions.
///
/// Surveys are returned without their elements; those live in the
/// [`ElementRepository`] and are loaded separately.
#[async_trait]
pub trait SurveyRepository: Send + Sync {
    /// Gets one revision by its full identity.
    async fn get_survey(&self, study_id: &str, keys: SurveyKeys) -> Result<Option<Survey>>;

    /// Gets the revision with the highest `created_on` for a survey.
    async fn get_most_recent(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>>;

    /// Gets the most recent published revision for a survey.
    async fn get_most_recent_published(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>>;

    /// Gets every revision of a survey, most recent first.
    async fn get_all_versions(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<Survey>>;

    /// Gets the survey GUID that owns an identifier within a study.
    async fn get_guid_for_identifier(
        &self,
        study_id: &str,
        identifier: &str,
        include_deleted: bool,
    ) -> Result<Option<Uuid>>;

    /// Gets the most recent revision of every survey in a study, ordered by name.
    async fn get_all_most_recent(&self, study_id: &str, include_deleted: bool)
        -> Result<Vec<Survey>>;

    /// Gets the most recent published revision of every survey in a study,
    /// ordered by name.
    async fn get_all_most_recently_published(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>>;

    /// Inserts or updates a revision and returns its new lock version.
    ///
    /// A survey without a version is inserted and fails with
    /// `AlreadyExists` if the identity is taken. A survey with a version is
    /// only written if the stored version still matches, otherwise
    /// `ConcurrentModification`.
    async fn save_survey(&self, survey: &Survey) -> Result<u64>;

    /// Marks a revision deleted under the same version check as
    /// [`save_survey`](Self::save_survey).
    async fn delete_survey(&self, survey: &Survey) -> Result<u64>;

    /// Removes a revision for good.
    async fn delete_survey_permanently(&self, study_id: &str, keys: SurveyKeys) -> Result<()>;
}

/// Repository for the ordered elements of a survey revision.
#[async_trait]
pub trait ElementRepository: Send + Sync {
    /// Gets the elements of a revision ordered by position.
    async fn get_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
    ) -> Result<Vec<SurveyElement>>;

    /// Replaces all elements of a revision in one atomic write.
    async fn replace_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
        elements: &[SurveyElement],
    ) -> Result<()>;

    /// Deletes all elements of a revision. Deleting nothing is not an error.
    async fn delete_elements(&self, survey_guid: Uuid, created_on: DateTime<Utc>) -> Result<()>;
}
