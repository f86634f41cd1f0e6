mod element;
mod error;
mod operations;
mod rules;
mod types;

pub use element::{
    Constraints, DataType, ElementKind, InfoScreen, Question, RuleOperator, SurveyElement,
    SurveyRule,
};
pub use error::{Result, SurveyError};
pub use operations::{
    assign_element_keys, is_visible, latest_per_guid, next_revision_timestamp, now_millis,
    prepare_elements, regenerate_element_guids, select_most_recent, sort_most_recent_first,
};
pub use rules::{reconcile_all, reconcile_rules};
pub use types::{Survey, SurveyKeys, SurveyState};
