//! Migration of legacy constraint rules into element rules.
//!
//! Questions used to keep their rules inside `constraints.rules`. Newer
//! clients read `after_rules` on the element instead. Until a question's
//! constraint rules are emptied they remain the source for an empty
//! `after_rules`; once `after_rules` holds anything it wins. After
//! reconciliation both lists are equal, so either reader sees the same rules.
//!
//! This is part of the Functional Core - pure functions with no side effects
//! beyond normalizing the element passed in.

use super::element::{ElementKind, SurveyElement};

/// Normalizes one element so both rule views agree.
///
/// No-op for info screens. Idempotent.
pub fn reconcile_rules(element: &mut SurveyElement) {
    let ElementKind::Question(question) = &mut element.kind else {
        return;
    };
    if element.after_rules.is_empty() && !question.constraints.rules.is_empty() {
        element.after_rules = question.constraints.rules.clone();
    }
    question.constraints.rules = element.after_rules.clone();
}

/// Reconciles every element of a survey.
pub fn reconcile_all(elements: &mut [SurveyElement]) {
    elements.iter_mut().for_each(reconcile_rules);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{Constraints, DataType, RuleOperator, SurveyRule};
    use serde_json::json;

    fn legacy_rule() -> SurveyRule {
        SurveyRule::skip_to(RuleOperator::Eq, Some(json!(true)), "smoker-details")
    }

    fn element_rule() -> SurveyRule {
        SurveyRule::end_survey(RuleOperator::Declined, None)
    }

    fn question_with_legacy_rules() -> SurveyElement {
        SurveyElement::question(
            "smoker",
            "Do you smoke?",
            Constraints::new(DataType::Boolean).with_rule(legacy_rule()),
        )
    }

    fn constraint_rules(element: &SurveyElement) -> Vec<SurveyRule> {
        element
            .question_payload()
            .map(|q| q.constraints.rules.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_legacy_rules_copied_into_empty_after_rules() {
        let mut element = question_with_legacy_rules();

        reconcile_rules(&mut element);

        assert_eq!(element.after_rules, vec![legacy_rule()]);
        assert_eq!(constraint_rules(&element), vec![legacy_rule()]);
    }

    #[test]
    fn test_after_rules_win_when_both_present() {
        let mut element = question_with_legacy_rules().with_after_rule(element_rule());

        reconcile_rules(&mut element);

        assert_eq!(element.after_rules, vec![element_rule()]);
        assert_eq!(constraint_rules(&element), vec![element_rule()]);
    }

    #[test]
    fn test_emptied_constraint_rules_take_after_rules() {
        let mut element = SurveyElement::question(
            "smoker",
            "Do you smoke?",
            Constraints::new(DataType::Boolean),
        )
        .with_after_rule(element_rule());

        reconcile_rules(&mut element);

        assert_eq!(constraint_rules(&element), vec![element_rule()]);
    }

    #[test]
    fn test_no_rules_stays_empty() {
        let mut element =
            SurveyElement::question("age", "Age?", Constraints::new(DataType::Integer));

        reconcile_rules(&mut element);

        assert!(element.after_rules.is_empty());
        assert!(constraint_rules(&element).is_empty());
    }

    #[test]
    fn test_info_screen_is_untouched() {
        let mut element = SurveyElement::info_screen("intro", "Welcome", "Hello")
            .with_after_rule(element_rule());
        let before = element.clone();

        reconcile_rules(&mut element);

        assert_eq!(element, before);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let cases = vec![
            question_with_legacy_rules(),
            question_with_legacy_rules().with_after_rule(element_rule()),
            SurveyElement::question("q", "Q?", Constraints::new(DataType::String))
                .with_after_rule(element_rule()),
            SurveyElement::info_screen("intro", "Welcome", "Hello"),
        ];

        for mut element in cases {
            reconcile_rules(&mut element);
            let once = element.clone();
            reconcile_rules(&mut element);
            assert_eq!(element, once);
        }
    }

    #[test]
    fn test_reconcile_all_touches_every_question() {
        let mut elements = vec![
            question_with_legacy_rules(),
            SurveyElement::info_screen("intro", "Welcome", "Hello"),
            question_with_legacy_rules(),
        ];

        reconcile_all(&mut elements);

        assert_eq!(elements[0].after_rules, vec![legacy_rule()]);
        assert!(elements[1].after_rules.is_empty());
        assert_eq!(elements[2].after_rules, vec![legacy_rule()]);
    }
}
