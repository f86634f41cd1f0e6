use serde_json::json;
use surveyor_core::survey::{
    Constraints, DataType, RuleOperator, Survey, SurveyElement, SurveyRule,
};

/// Builds a demographics questionnaire for demonstration purposes.
///
/// The smoker question keeps its skip rule in the legacy constraint slot so
/// saving it shows rule reconciliation at work.
pub fn demographics_survey(study_id: &str) -> Survey {
    Survey::new(study_id, "demographics", "Demographics")
        .with_copyright_notice("(c) Surveyor demo")
        .with_element(SurveyElement::info_screen(
            "intro",
            "Welcome",
            "This survey takes about two minutes.",
        ))
        .with_element(SurveyElement::question(
            "age",
            "How old are you?",
            Constraints::new(DataType::Integer).required(),
        ))
        .with_element(SurveyElement::question(
            "smoker",
            "Do you smoke?",
            Constraints::new(DataType::Boolean).with_rule(SurveyRule::skip_to(
                RuleOperator::Eq,
                Some(json!(false)),
                "thanks",
            )),
        ))
        .with_element(SurveyElement::question(
            "cigarettes",
            "How many cigarettes do you smoke per day?",
            Constraints::new(DataType::Integer),
        ))
        .with_element(SurveyElement::info_screen(
            "thanks",
            "Thank you",
            "Your answers have been recorded.",
        ))
}

/// A follow-up question appended when the demo edits a branched revision.
pub fn sleep_question() -> SurveyElement {
    SurveyElement::question(
        "sleep",
        "How many hours do you sleep per night?",
        Constraints::new(DataType::Decimal),
    )
    .with_after_rule(SurveyRule::end_survey(RuleOperator::Declined, None))
}
