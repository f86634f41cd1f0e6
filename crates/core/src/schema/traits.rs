use async_trait::async_trait;

use crate::survey::{Survey, SurveyKeys};

use super::SchemaError;

/// Produces and removes the upload schema derived from a survey.
///
/// Implementations must be re-entrant per survey revision: calling
/// [`create_or_cut_revision`](Self::create_or_cut_revision) again for the
/// same study, GUID and `created_on` returns the revision already cut for it.
#[async_trait]
pub trait SchemaBridge: Send + Sync {
    /// Creates the schema for a survey, or cuts or reuses a revision of it.
    ///
    /// Returns the schema revision the survey should reference.
    async fn create_or_cut_revision(
        &self,
        study_id: &str,
        survey: &Survey,
        force_new_revision: bool,
    ) -> Result<u32, SchemaError>;

    /// Deletes every schema revision derived from a survey revision.
    async fn delete_schemas_for_survey(
        &self,
        study_id: &str,
        keys: SurveyKeys,
    ) -> Result<(), SchemaError>;
}
