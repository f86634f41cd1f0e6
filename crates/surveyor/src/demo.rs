//! Walks one survey through its whole lifecycle.

use serde::Serialize;
use surveyor_core::survey::{Result, Survey, SurveyError};

use crate::mock_data::{demographics_survey, sleep_question};
use crate::versioning::VersioningEngine;

/// One step of a demo run and the revision it produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoStep {
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey: Option<Survey>,
}

impl DemoStep {
    fn with_survey(step: impl Into<String>, survey: &Survey) -> Self {
        Self {
            step: step.into(),
            survey: Some(survey.clone()),
        }
    }

    fn message(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            survey: None,
        }
    }
}

/// Creates, edits, publishes, branches, deletes and finally purges a survey.
///
/// Everything the run creates is purged at the end so it can be repeated
/// against a persistent backend.
pub async fn run(engine: &VersioningEngine, study_id: &str) -> Result<Vec<DemoStep>> {
    let mut steps = Vec::new();

    let created = engine.create(demographics_survey(study_id)).await?;
    steps.push(DemoStep::with_survey("Created draft", &created));

    let mut edit = created.clone();
    if let Some(position) = edit.elements.iter().position(|e| e.identifier == "smoker") {
        let smoker = edit.elements.remove(position);
        edit.elements.insert(1, smoker);
    }
    let reordered = engine.update(study_id, edit).await?;
    steps.push(DemoStep::with_survey("Moved smoker question up", &reordered));

    let published = engine.publish(study_id, &reordered, false).await?;
    steps.push(DemoStep::with_survey("Published", &published));

    let again = engine.publish(study_id, &published, false).await?;
    steps.push(DemoStep::with_survey(
        "Published again (no new schema revision)",
        &again,
    ));

    let branch_keys = published.keys().ok_or_else(|| {
        SurveyError::InvalidState(
            "published survey has no revision identity".to_string(),
        )
    })?;
    let branched = engine.version_survey(study_id, branch_keys).await?;
    steps.push(DemoStep::with_survey("Branched new draft", &branched));

    let mut edit = branched.clone();
    edit.elements.push(sleep_question());
    let edited = engine.update(study_id, edit).await?;
    steps.push(DemoStep::with_survey("Added sleep question to branch", &edited));

    let republished = engine.publish(study_id, &edited, true).await?;
    steps.push(DemoStep::with_survey(
        "Published branch with a new schema revision",
        &republished,
    ));

    let guid = branch_keys.guid;
    let versions = engine.get_survey_all_versions(study_id, guid, true).await?;
    steps.push(DemoStep::message(format!(
        "Survey has {} revisions",
        versions.len()
    )));

    let deleted = engine.delete(&republished).await?;
    steps.push(DemoStep::with_survey("Soft-deleted branch", &deleted));

    for revision in &versions {
        if let Some(keys) = revision.keys() {
            engine.delete_survey_permanently(study_id, keys).await?;
        }
    }
    steps.push(DemoStep::message(format!(
        "Purged {} revisions",
        versions.len()
    )));

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_walks_full_lifecycle() {
        let engine = VersioningEngine::in_memory();

        let steps = run(&engine, "demo-study").await.unwrap();

        assert_eq!(steps.len(), 10);
        let published = steps[2].survey.as_ref().unwrap();
        let again = steps[3].survey.as_ref().unwrap();
        let republished = steps[6].survey.as_ref().unwrap();
        assert_eq!(published.schema_revision, Some(1));
        assert_eq!(again.version, published.version);
        assert_eq!(republished.schema_revision, Some(2));
        assert_eq!(steps[7].step, "Survey has 2 revisions");
    }

    #[tokio::test]
    async fn test_demo_reconciles_and_reorders() {
        let engine = VersioningEngine::in_memory();

        let steps = run(&engine, "demo-study").await.unwrap();

        let reordered = steps[1].survey.as_ref().unwrap();
        let identifiers: Vec<_> = reordered
            .elements
            .iter()
            .map(|e| (e.identifier.as_str(), e.order))
            .collect();
        assert_eq!(identifiers[0], ("intro", 0));
        assert_eq!(identifiers[1], ("smoker", 1));
        assert_eq!(reordered.elements[1].after_rules.len(), 1);
    }

    #[tokio::test]
    async fn test_demo_can_run_twice() {
        let engine = VersioningEngine::in_memory();

        run(&engine, "demo-study").await.unwrap();
        run(&engine, "demo-study").await.unwrap();

        let remaining = engine
            .get_all_surveys_most_recent_version("demo-study")
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }
}
