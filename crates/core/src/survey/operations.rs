use std::collections::HashMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use super::element::SurveyElement;
use super::rules::reconcile_all;
use super::types::{Survey, SurveyKeys};

/// Returns the current time truncated to millisecond precision.
///
/// Revision timestamps are stored as epoch milliseconds, so anything finer
/// would not survive a round trip through storage.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Picks the `created_on` for a revision branched from `source`.
///
/// Always strictly after the source so two revisions of one survey can never
/// share an identity, even when branched within the same millisecond.
pub fn next_revision_timestamp(now: DateTime<Utc>, source: DateTime<Utc>) -> DateTime<Utc> {
    if now > source {
        now
    } else {
        source + Duration::milliseconds(1)
    }
}

/// Points every element at its revision and numbers them by position.
pub fn assign_element_keys(elements: &mut [SurveyElement], keys: SurveyKeys) {
    for (index, element) in elements.iter_mut().enumerate() {
        element.survey_keys = Some(keys);
        element.order = index as u32;
    }
}

/// Reconciles rules and assigns keys and order, the normalization every
/// element write goes through.
pub fn prepare_elements(elements: &mut [SurveyElement], keys: SurveyKeys) {
    reconcile_all(elements);
    assign_element_keys(elements, keys);
}

/// Gives every element a fresh GUID, keeping its content.
pub fn regenerate_element_guids(elements: &mut [SurveyElement]) {
    for element in elements.iter_mut() {
        element.guid = Uuid::new_v4();
    }
}

/// Returns true if a revision should be visible given the deletion filter.
pub fn is_visible(survey: &Survey, include_deleted: bool) -> bool {
    include_deleted || !survey.deleted
}

/// Sorts revisions most recent first.
pub fn sort_most_recent_first(surveys: &mut [Survey]) {
    surveys.sort_by(|a, b| b.created_on.cmp(&a.created_on));
}

/// Selects the most recent revision passing the filters.
pub fn select_most_recent(
    revisions: impl IntoIterator<Item = Survey>,
    include_deleted: bool,
    published_only: bool,
) -> Option<Survey> {
    revisions
        .into_iter()
        .filter(|survey| is_visible(survey, include_deleted))
        .filter(|survey| !published_only || survey.published)
        .max_by_key(|survey| survey.created_on)
}

/// Reduces revisions of many surveys to the most recent one per GUID,
/// ordered by name.
pub fn latest_per_guid(
    revisions: impl IntoIterator<Item = Survey>,
    include_deleted: bool,
    published_only: bool,
) -> Vec<Survey> {
    let mut latest: HashMap<Uuid, Survey> = HashMap::new();
    for survey in revisions {
        if !is_visible(&survey, include_deleted) || (published_only && !survey.published) {
            continue;
        }
        let Some(guid) = survey.guid else {
            continue;
        };
        match latest.get(&guid) {
            Some(current) if current.created_on >= survey.created_on => {}
            _ => {
                latest.insert(guid, survey);
            }
        }
    }

    let mut surveys: Vec<Survey> = latest.into_values().collect();
    surveys.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.guid.cmp(&b.guid)));
    surveys
}
