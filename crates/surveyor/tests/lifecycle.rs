//! End-to-end survey lifecycle through the public API.

use std::sync::Arc;

use surveyor::mock_data::demographics_survey;
use surveyor::schema::InMemorySchemaBridge;
use surveyor::storage::InMemoryRepository;
use surveyor::VersioningEngine;
use surveyor_core::survey::{SurveyError, SurveyState};

const STUDY: &str = "lifecycle-study";

fn engine() -> (VersioningEngine, InMemorySchemaBridge) {
    let repo = Arc::new(InMemoryRepository::new());
    let bridge = InMemorySchemaBridge::new();
    let engine = VersioningEngine::new(repo.clone(), repo, Arc::new(bridge.clone()));
    (engine, bridge)
}

#[tokio::test]
async fn test_draft_to_published_to_branch() {
    let (engine, bridge) = engine();

    let draft = engine.create(demographics_survey(STUDY)).await.unwrap();
    assert_eq!(draft.state(), SurveyState::Draft);
    let guid = draft.guid.unwrap();

    let published = engine.publish(STUDY, &draft, false).await.unwrap();
    assert_eq!(published.state(), SurveyState::Published);
    assert_eq!(published.schema_revision, Some(1));
    assert_eq!(bridge.current_revision(STUDY, guid).await, Some(1));

    let edit = engine.update(STUDY, published.clone()).await;
    assert!(matches!(edit, Err(SurveyError::InvalidState(_))));

    let branch = engine
        .version_survey(STUDY, published.keys().unwrap())
        .await
        .unwrap();
    assert_eq!(branch.state(), SurveyState::Draft);
    assert_eq!(branch.schema_revision, None);

    let republished = engine.publish(STUDY, &branch, true).await.unwrap();
    assert_eq!(republished.schema_revision, Some(2));

    let versions = engine
        .get_survey_all_versions(STUDY, guid, false)
        .await
        .unwrap();
    let created: Vec<_> = versions.iter().map(|s| s.created_on).collect();
    assert_eq!(created, vec![republished.created_on, published.created_on]);

    let latest = engine
        .get_survey_most_recently_published_version(STUDY, guid, true)
        .await
        .unwrap();
    assert_eq!(latest.created_on, republished.created_on);
    assert_eq!(latest.elements.len(), 5);
}

#[tokio::test]
async fn test_identifier_lookup_and_deletion() {
    let (engine, _) = engine();
    let draft = engine.create(demographics_survey(STUDY)).await.unwrap();

    let guid = engine
        .get_survey_guid_for_identifier(STUDY, "demographics")
        .await
        .unwrap();
    assert_eq!(Some(guid), draft.guid);

    engine.delete(&draft).await.unwrap();

    let hidden = engine
        .get_survey_guid_for_identifier(STUDY, "demographics")
        .await;
    assert!(matches!(hidden, Err(SurveyError::NotFound { .. })));
    let admin = engine
        .admin_get_survey_guid_for_identifier(STUDY, "demographics")
        .await
        .unwrap();
    assert_eq!(admin, guid);

    let replacement = engine.create(demographics_survey(STUDY)).await.unwrap();
    assert_ne!(replacement.guid, draft.guid);
}

#[tokio::test]
async fn test_concurrent_editors_one_wins() {
    let (engine, _) = engine();
    let draft = engine.create(demographics_survey(STUDY)).await.unwrap();

    let mut alice = draft.clone();
    alice.name = "Demographics (Alice)".to_string();
    let mut bob = draft.clone();
    bob.name = "Demographics (Bob)".to_string();

    let saved = engine.update(STUDY, alice).await.unwrap();
    let conflict = engine.update(STUDY, bob).await;

    assert_eq!(saved.version, Some(2));
    assert!(matches!(
        conflict,
        Err(SurveyError::ConcurrentModification { .. })
    ));
    let stored = engine
        .get_survey(STUDY, draft.keys().unwrap(), false)
        .await
        .unwrap();
    assert_eq!(stored.name, "Demographics (Alice)");
}

#[tokio::test]
async fn test_purge_removes_every_trace() {
    let (engine, bridge) = engine();
    let draft = engine.create(demographics_survey(STUDY)).await.unwrap();
    let published = engine.publish(STUDY, &draft, false).await.unwrap();
    let keys = published.keys().unwrap();

    engine.delete_survey_permanently(STUDY, keys).await.unwrap();

    let gone = engine.get_survey(STUDY, keys, true).await;
    assert!(matches!(gone, Err(SurveyError::NotFound { .. })));
    assert_eq!(bridge.current_revision(STUDY, keys.guid).await, None);
    engine.delete_survey_permanently(STUDY, keys).await.unwrap();
}
