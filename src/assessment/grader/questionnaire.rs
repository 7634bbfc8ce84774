use std::collections::BTreeMap;

use serde_json::Value;

use crate::assessment::config::GradingConfig;
use crate::assessment::types::{GradeDetails, GradeResult, GradedBy, QuestionnaireConfig, QuestionnaireField};

/// Self-report on a 1-5 scale mapped into [0,1].
pub fn self_report_mastery(value: f64) -> f64 {
    ((value - 1.0) / 4.0).clamp(0.0, 1.0)
}

fn scale_value(field: &QuestionnaireField, raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let lookup = field.value_to_confidence.as_ref().and_then(|table| {
                table
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(s.trim()))
                    .map(|(_, v)| *v)
            });
            lookup.or_else(|| s.trim().parse::<f64>().ok())
        }
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Questionnaires never fail. Fields with a skill mapping contribute low-trust
/// self-report evidence; several fields on one skill are averaged.
pub fn grade(cfg: &QuestionnaireConfig, answer: &Value, config: &GradingConfig) -> GradeResult {
    let empty = serde_json::Map::new();
    let responses = answer.as_object().unwrap_or(&empty);

    let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for field in &cfg.fields {
        let Some(skill) = field.skill_mapping.as_ref() else {
            continue;
        };
        let Some(value) = responses.get(&field.id).and_then(|raw| scale_value(field, raw)) else {
            continue;
        };
        let entry = sums.entry(skill.clone()).or_insert((0.0, 0));
        entry.0 += self_report_mastery(value);
        entry.1 += 1;
    }

    let skill_scores: BTreeMap<String, f64> = sums
        .into_iter()
        .map(|(skill, (sum, n))| (skill, sum / n as f64))
        .collect();

    GradeResult {
        score: 1.0,
        passed: true,
        skill_scores: (!skill_scores.is_empty()).then_some(skill_scores),
        confidence: Some(config.questionnaire_confidence),
        feedback: None,
        details: Some(GradeDetails {
            graded_by: Some(GradedBy::SelfReport),
            ..GradeDetails::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::types::FieldInput;

    fn field(id: &str, skill: &str, table: Option<&[(&str, f64)]>) -> QuestionnaireField {
        QuestionnaireField {
            id: id.to_string(),
            label: id.to_string(),
            input: FieldInput::Text,
            skill_mapping: Some(skill.to_string()),
            value_to_confidence: table.map(|t| t.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
            profile_target: None,
        }
    }

    #[test]
    fn transform_clamps_to_unit_interval() {
        assert_eq!(self_report_mastery(1.0), 0.0);
        assert_eq!(self_report_mastery(3.0), 0.5);
        assert_eq!(self_report_mastery(5.0), 1.0);
        assert_eq!(self_report_mastery(9.0), 1.0);
        assert_eq!(self_report_mastery(0.0), 0.0);
    }

    #[test]
    fn maps_sliders_and_tables() {
        let cfg = QuestionnaireConfig {
            fields: vec![
                field("slider", "web.html", None),
                field("comfort", "practices.git", Some(&[("basic", 2.0), ("expert", 5.0)][..])),
            ],
        };
        let answer = serde_json::json!({"slider": 4, "comfort": "Expert"});
        let result = grade(&cfg, &answer, &GradingConfig::default());
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.confidence, Some(0.2));
        let scores = result.skill_scores.unwrap();
        assert_eq!(scores["web.html"], 0.75);
        assert_eq!(scores["practices.git"], 1.0);
    }

    #[test]
    fn unmapped_or_missing_fields_are_ignored() {
        let cfg = QuestionnaireConfig {
            fields: vec![field("slider", "web.html", None)],
        };
        let result = grade(&cfg, &serde_json::json!({"other": 3}), &GradingConfig::default());
        assert!(result.passed);
        assert!(result.skill_scores.is_none());

        let result = grade(&cfg, &serde_json::json!("not an object"), &GradingConfig::default());
        assert!(result.passed);
    }

    #[test]
    fn fields_on_same_skill_are_averaged() {
        let cfg = QuestionnaireConfig {
            fields: vec![field("a", "web.html", None), field("b", "web.html", None)],
        };
        let result = grade(&cfg, &serde_json::json!({"a": 1, "b": 5}), &GradingConfig::default());
        assert_eq!(result.skill_scores.unwrap()["web.html"], 0.5);
    }
}
