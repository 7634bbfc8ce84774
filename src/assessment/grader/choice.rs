use std::collections::BTreeMap;

use serde_json::Value;

use super::parse_answer;
use crate::assessment::config::GradingConfig;
use crate::assessment::types::*;

const NO_ANSWER: &str = "No answer";

fn binary(correct: bool) -> f64 {
    if correct {
        1.0
    } else {
        0.0
    }
}

fn verdict_feedback(correct: bool, explanation: Option<&str>) -> String {
    let head = if correct { "Correct!" } else { "Not quite." };
    match explanation {
        Some(text) if !text.is_empty() => format!("{head} {text}"),
        _ => head.to_string(),
    }
}

pub fn mcq_confidence(difficulty: SkillLevel, config: &GradingConfig) -> f64 {
    match difficulty {
        SkillLevel::Beginner => config.mcq_confidence.beginner,
        SkillLevel::Intermediate => config.mcq_confidence.intermediate,
        SkillLevel::Advanced => config.mcq_confidence.advanced,
    }
}

pub fn grade_mcq(step: &StepConfig, cfg: &McqConfig, answer: &Value, config: &GradingConfig) -> GradeResult {
    let selected = parse_answer::<McqAnswer>(answer)
        .and_then(|a| a.selected_option_id)
        .filter(|id| !id.trim().is_empty());
    let Some(option) = selected.and_then(|id| cfg.options.iter().find(|o| o.id == id)) else {
        return GradeResult::rejected(NO_ANSWER);
    };

    let score = binary(option.is_correct);
    GradeResult {
        score,
        passed: option.is_correct,
        skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, score)),
        confidence: Some(mcq_confidence(cfg.difficulty, config)),
        feedback: Some(verdict_feedback(option.is_correct, cfg.explanation.as_deref())),
        details: Some(GradeDetails {
            graded_by: Some(GradedBy::AnswerKey),
            ..GradeDetails::default()
        }),
    }
}

/// Highest threshold first; anything below the intermediate threshold is beginner.
pub fn detect_level(correct_count: u32, mapping: &LevelMapping) -> SkillLevel {
    if correct_count >= mapping.advanced {
        SkillLevel::Advanced
    } else if correct_count >= mapping.intermediate {
        SkillLevel::Intermediate
    } else {
        SkillLevel::Beginner
    }
}

/// Calibration probe: always passes, stores the raw correct count for skip rules.
pub fn grade_burst(step: &StepConfig, cfg: &BurstConfig, answer: &Value, config: &GradingConfig) -> GradeResult {
    let selections = parse_answer::<BurstAnswer>(answer).unwrap_or_default().answers;

    let question_results: BTreeMap<String, bool> = cfg
        .questions
        .iter()
        .map(|q| {
            let correct = selections
                .get(&q.id)
                .and_then(|picked| q.options.iter().find(|o| &o.id == picked))
                .is_some_and(|o| o.is_correct);
            (q.id.clone(), correct)
        })
        .collect();

    let total = cfg.questions.len() as u32;
    let correct_count = question_results.values().filter(|c| **c).count() as u32;
    let score = if total == 0 {
        0.0
    } else {
        correct_count as f64 / total as f64
    };
    let level = detect_level(correct_count, &cfg.level_mapping);

    GradeResult {
        score,
        passed: true,
        skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, score)),
        confidence: Some(config.burst_confidence),
        feedback: Some(format!("{correct_count}/{total} correct")),
        details: Some(GradeDetails {
            correct_count: Some(correct_count),
            total_questions: Some(total),
            detected_level: Some(level),
            question_results: Some(question_results),
            graded_by: Some(GradedBy::AnswerKey),
            ..GradeDetails::default()
        }),
    }
}

pub fn grade_design_comparison(
    step: &StepConfig,
    cfg: &DesignComparisonConfig,
    answer: &Value,
    config: &GradingConfig,
) -> GradeResult {
    let selected = parse_answer::<DesignComparisonAnswer>(answer)
        .and_then(|a| a.selected_option)
        .filter(|id| !id.trim().is_empty());
    let Some(selected) = selected else {
        return GradeResult::rejected(NO_ANSWER);
    };

    let correct = selected == cfg.correct_option;
    let score = binary(correct);
    GradeResult {
        score,
        passed: correct,
        skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, score)),
        confidence: Some(config.design_comparison_confidence),
        feedback: Some(verdict_feedback(correct, cfg.explanation.as_deref())),
        details: Some(GradeDetails {
            graded_by: Some(GradedBy::AnswerKey),
            ..GradeDetails::default()
        }),
    }
}
