use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::types::SurveyKeys;

/// Comparison applied to an answer when evaluating a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// The participant declined to answer.
    #[serde(rename = "de")]
    Declined,
    Always,
    Any,
    All,
}

/// A navigation or side-effect rule attached to a survey element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRule {
    pub operator: RuleOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Identifier of the element to jump to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to: Option<String>,
    #[serde(default)]
    pub end_survey: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_data_group: Option<String>,
}

impl SurveyRule {
    /// Creates a rule that skips to another element when it matches.
    pub fn skip_to(operator: RuleOperator, value: Option<Value>, target: impl Into<String>) -> Self {
        Self {
            operator,
            value,
            skip_to: Some(target.into()),
            end_survey: false,
            assign_data_group: None,
        }
    }

    /// Creates a rule that ends the survey when it matches.
    pub fn end_survey(operator: RuleOperator, value: Option<Value>) -> Self {
        Self {
            operator,
            value,
            skip_to: None,
            end_survey: true,
            assign_data_group: None,
        }
    }

    /// Creates a rule that assigns the participant to a data group when it matches.
    pub fn assign_data_group(
        operator: RuleOperator,
        value: Option<Value>,
        data_group: impl Into<String>,
    ) -> Self {
        Self {
            operator,
            value,
            skip_to: None,
            end_survey: false,
            assign_data_group: Some(data_group.into()),
        }
    }
}

/// The type of answer a question collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Duration,
}

/// Validation constraints for a question's answer.
///
/// `rules` is the legacy location of a question's rules. See
/// [`reconcile_rules`](super::reconcile_rules) for how it is kept in step with
/// the element-level `after_rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub rules: Vec<SurveyRule>,
}

impl Constraints {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            required: false,
            rules: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_rule(mut self, rule: SurveyRule) -> Self {
        self.rules.push(rule);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_hint: Option<String>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoScreen {
    pub title: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_detail: Option<String>,
}

/// Variant payload of a survey element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Question(Question),
    InfoScreen(InfoScreen),
}

impl ElementKind {
    /// Discriminant string, matching the serialized `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Question(_) => "question",
            ElementKind::InfoScreen(_) => "info_screen",
        }
    }
}

/// One entry of a survey's ordered element list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyElement {
    #[serde(default = "Uuid::new_v4")]
    pub guid: Uuid,
    pub identifier: String,
    /// The survey revision this element belongs to. Set on every save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_keys: Option<SurveyKeys>,
    /// 0-based position within the survey. Set on every save.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub before_rules: Vec<SurveyRule>,
    #[serde(default)]
    pub after_rules: Vec<SurveyRule>,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl SurveyElement {
    /// Creates a new question element.
    pub fn question(
        identifier: impl Into<String>,
        prompt: impl Into<String>,
        constraints: Constraints,
    ) -> Self {
        Self::new(
            identifier,
            ElementKind::Question(Question {
                prompt: prompt.into(),
                prompt_detail: None,
                ui_hint: None,
                constraints,
            }),
        )
    }

    /// Creates a new info screen element.
    pub fn info_screen(
        identifier: impl Into<String>,
        title: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self::new(
            identifier,
            ElementKind::InfoScreen(InfoScreen {
                title: title.into(),
                prompt: prompt.into(),
                prompt_detail: None,
            }),
        )
    }

    fn new(identifier: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            guid: Uuid::new_v4(),
            identifier: identifier.into(),
            survey_keys: None,
            order: 0,
            before_rules: Vec::new(),
            after_rules: Vec::new(),
            kind,
        }
    }

    /// Sets a specific GUID for this element (useful for testing).
    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = guid;
        self
    }

    pub fn with_before_rule(mut self, rule: SurveyRule) -> Self {
        self.before_rules.push(rule);
        self
    }

    pub fn with_after_rule(mut self, rule: SurveyRule) -> Self {
        self.after_rules.push(rule);
        self
    }

    pub fn is_question(&self) -> bool {
        matches!(self.kind, ElementKind::Question(_))
    }

    pub fn question_payload(&self) -> Option<&Question> {
        match &self.kind {
            ElementKind::Question(question) => Some(question),
            ElementKind::InfoScreen(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_serializes_with_type_tag() {
        let element = SurveyElement::question(
            "age",
            "How old are you?",
            Constraints::new(DataType::Integer),
        );
        let value = serde_json::to_value(&element).unwrap();

        assert_eq!(value["type"], "question");
        assert_eq!(value["identifier"], "age");
        assert_eq!(value["prompt"], "How old are you?");
        assert_eq!(value["constraints"]["dataType"], "integer");
        assert!(value.get("surveyKeys").is_none());
    }

    #[test]
    fn test_info_screen_deserializes_from_tagged_json() {
        let value = json!({
            "guid": "550e8400-e29b-41d4-a716-446655440010",
            "identifier": "intro",
            "type": "info_screen",
            "title": "Welcome",
            "prompt": "This survey takes five minutes."
        });

        let element: SurveyElement = serde_json::from_value(value).unwrap();

        assert!(!element.is_question());
        assert_eq!(element.order, 0);
        assert!(element.after_rules.is_empty());
        match element.kind {
            ElementKind::InfoScreen(screen) => assert_eq!(screen.title, "Welcome"),
            ElementKind::Question(_) => panic!("Expected info screen"),
        }
    }

    #[test]
    fn test_missing_guid_is_generated() {
        let value = json!({
            "identifier": "smoker",
            "type": "question",
            "prompt": "Do you smoke?",
            "constraints": { "dataType": "boolean" }
        });

        let element: SurveyElement = serde_json::from_value(value).unwrap();

        assert!(!element.guid.is_nil());
        assert!(element.is_question());
    }

    #[test]
    fn test_declined_operator_uses_short_name() {
        let rule = SurveyRule::end_survey(RuleOperator::Declined, None);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["operator"], "de");
        assert_eq!(value["endSurvey"], true);
    }

    #[test]
    fn test_type_name_matches_tag() {
        let question = SurveyElement::question("q", "Q?", Constraints::new(DataType::Boolean));
        let screen = SurveyElement::info_screen("s", "Title", "Prompt");
        assert_eq!(question.kind.type_name(), "question");
        assert_eq!(screen.kind.type_name(), "info_screen");
    }
}
