//! Pretty output formatting.

use surveyor_core::survey::{ElementKind, Survey, SurveyElement};

use crate::demo::DemoStep;

fn format_millis(survey: &Survey) -> String {
    survey
        .created_on
        .map(|t| t.timestamp_millis().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format a survey revision for display.
pub fn format_survey(survey: &Survey) -> String {
    let guid = survey
        .guid
        .map(|g| g.to_string())
        .unwrap_or_else(|| "-".to_string());
    let state = match (survey.published, survey.deleted) {
        (_, true) => "deleted",
        (true, false) => "published",
        (false, false) => "draft",
    };
    let mut output = format!(
        "{} [{}]\n  Identifier: {}\n  GUID: {}\n  Created on: {}",
        survey.name,
        state,
        survey.identifier,
        guid,
        format_millis(survey)
    );
    if let Some(version) = survey.version {
        output.push_str(&format!("\n  Version: {}", version));
    }
    if let Some(revision) = survey.schema_revision {
        output.push_str(&format!("\n  Schema revision: {}", revision));
    }
    if let Some(notice) = &survey.copyright_notice {
        output.push_str(&format!("\n  Copyright: {}", notice));
    }
    for element in &survey.elements {
        output.push_str(&format!("\n    {}", format_element(element)));
    }
    output
}

/// Format surveys for display.
pub fn format_surveys(surveys: &[Survey]) -> String {
    if surveys.is_empty() {
        return "No surveys found.".to_string();
    }
    let mut output = format!("SURVEYS ({})\n", surveys.len());
    output.push_str(&"-".repeat(40));
    for survey in surveys {
        output.push_str(&format!("\n{}", format_survey(survey)));
        output.push('\n');
    }
    output
}

/// Format an element as a single line.
pub fn format_element(element: &SurveyElement) -> String {
    let text = match &element.kind {
        ElementKind::Question(question) => question.prompt.as_str(),
        ElementKind::InfoScreen(screen) => screen.title.as_str(),
    };
    let mut line = format!(
        "{}. {} ({}): {}",
        element.order,
        element.identifier,
        element.kind.type_name(),
        text
    );
    if !element.after_rules.is_empty() {
        line.push_str(&format!(" [{} rules]", element.after_rules.len()));
    }
    line
}

/// Format the steps of a demo run for display.
pub fn format_demo(steps: &[DemoStep]) -> String {
    let mut output = format!("DEMO ({} steps)\n", steps.len());
    output.push_str(&"-".repeat(40));
    for step in steps {
        output.push_str(&format!("\n{}", step.step));
        if let Some(survey) = &step.survey {
            output.push_str(&format!("\n{}", format_survey(survey)));
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use surveyor_core::survey::{Constraints, DataType, SurveyKeys};
    use uuid::Uuid;

    fn sample() -> Survey {
        let mut survey = Survey::new("study-1", "demographics", "Demographics")
            .with_keys(SurveyKeys::new(
                Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap(),
                DateTime::from_timestamp_millis(1_718_444_400_123).unwrap(),
            ))
            .with_element(SurveyElement::question(
                "age",
                "How old are you?",
                Constraints::new(DataType::Integer),
            ));
        survey.version = Some(2);
        survey
    }

    #[test]
    fn test_format_survey() {
        let output = format_survey(&sample());

        assert!(output.starts_with("Demographics [draft]"));
        assert!(output.contains("GUID: 550e8400-e29b-41d4-a716-446655440001"));
        assert!(output.contains("Created on: 1718444400123"));
        assert!(output.contains("Version: 2"));
        assert!(output.contains("0. age (question): How old are you?"));
        assert!(!output.contains("Schema revision"));
    }

    #[test]
    fn test_format_survey_states() {
        let mut survey = sample();
        survey.published = true;
        survey.schema_revision = Some(3);
        let output = format_survey(&survey);
        assert!(output.starts_with("Demographics [published]"));
        assert!(output.contains("Schema revision: 3"));

        survey.deleted = true;
        assert!(format_survey(&survey).starts_with("Demographics [deleted]"));
    }

    #[test]
    fn test_format_surveys_empty() {
        assert_eq!(format_surveys(&[]), "No surveys found.");
    }

    #[test]
    fn test_format_surveys_header() {
        let output = format_surveys(&[sample(), sample()]);
        assert!(output.starts_with("SURVEYS (2)\n"));
    }
}
