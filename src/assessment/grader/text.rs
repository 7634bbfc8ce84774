use serde_json::Value;

use super::{parse_answer, with_retry, RubricGrader, RubricRequest, RubricVerdict};
use crate::assessment::config::{GradingConfig, HeuristicConfig};
use crate::assessment::error::GradingError;
use crate::assessment::types::*;

/// Used when a step does not list its own keywords.
const DEFAULT_VOCABULARY: &[&str] = &[
    "because",
    "example",
    "trade-off",
    "tradeoff",
    "performance",
    "readability",
    "maintain",
    "test",
    "error",
    "user",
    "scope",
    "function",
    "state",
    "data",
];

fn answer_text(answer: &Value) -> String {
    match answer {
        Value::String(s) => s.clone(),
        other => parse_answer::<TextAnswer>(other).map(|a| a.text).unwrap_or_default(),
    }
}

fn full_prompt(cfg: &TextPromptConfig) -> String {
    match &cfg.context {
        Some(context) if !context.is_empty() => format!("{}\n\n{}", cfg.prompt, context),
        _ => cfg.prompt.clone(),
    }
}

/// Deterministic score for when the rubric grader cannot be used. Returns the
/// score and the keywords that earned a bonus.
pub fn heuristic_score(
    text: &str,
    keywords: &[String],
    word_threshold: usize,
    config: &HeuristicConfig,
) -> (f64, Vec<String>) {
    let lower = text.to_lowercase();
    let words = text.split_whitespace().count();

    let vocabulary: Vec<String> = if keywords.is_empty() {
        DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect()
    } else {
        keywords.to_vec()
    };
    let matched: Vec<String> = vocabulary
        .into_iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .collect();

    let mut score = config.base_score;
    if words >= word_threshold {
        score += config.length_bonus;
    }
    score += matched.len() as f64 * config.keyword_bonus;
    (score.min(1.0), matched)
}

fn validate_verdict(verdict: RubricVerdict, max_score: f64) -> Result<RubricVerdict, GradingError> {
    if !verdict.score.is_finite() || verdict.score < 0.0 || verdict.score > max_score {
        return Err(GradingError::MalformedResponse(format!(
            "score {} outside 0..={max_score}",
            verdict.score
        )));
    }
    Ok(verdict)
}

pub async fn grade(
    step: &StepConfig,
    cfg: &TextPromptConfig,
    answer: &Value,
    rubric: Option<&dyn RubricGrader>,
    ai_confidence: f64,
    config: &GradingConfig,
) -> GradeResult {
    let raw = answer_text(answer);
    let text = raw.trim();
    if text.is_empty() {
        return GradeResult::rejected("No answer provided");
    }

    let h = &config.heuristic;
    let min_chars = cfg.min_chars.unwrap_or(h.min_chars);
    if text.chars().count() < min_chars {
        return GradeResult {
            score: h.too_short_score,
            passed: false,
            skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, h.too_short_score)),
            confidence: Some(config.heuristic_confidence),
            feedback: Some(format!(
                "Your answer is too short to assess. Aim for at least {min_chars} characters."
            )),
            details: Some(GradeDetails {
                graded_by: Some(GradedBy::Heuristic),
                ..GradeDetails::default()
            }),
        };
    }

    if let Some(grader) = rubric {
        let request = RubricRequest {
            prompt: full_prompt(cfg),
            answer: text.to_string(),
            rubric: cfg.rubric.clone(),
            max_score: cfg.max_score,
        };
        let outcome = with_retry(config.collaborator_retries, || grader.grade_text(&request))
            .await
            .and_then(|v| validate_verdict(v, cfg.max_score));
        match outcome {
            Ok(verdict) => {
                let score = verdict.score / cfg.max_score;
                return GradeResult {
                    score,
                    passed: score >= config.pass_threshold,
                    skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, score)),
                    confidence: Some(ai_confidence),
                    feedback: Some(verdict.feedback),
                    details: Some(GradeDetails {
                        graded_by: Some(GradedBy::Ai),
                        raw_score: Some(verdict.score),
                        max_score: Some(cfg.max_score),
                        ..GradeDetails::default()
                    }),
                };
            }
            Err(e) => {
                tracing::warn!(step_id = %step.id, error = %e, "Rubric grading failed, using heuristic");
            }
        }
    }

    let word_threshold = cfg.word_threshold.unwrap_or(h.word_threshold);
    let (score, matched) = heuristic_score(text, &cfg.keywords, word_threshold, h);
    GradeResult {
        score,
        passed: score >= config.pass_threshold,
        skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, score)),
        confidence: Some(config.heuristic_confidence),
        feedback: Some(format!(
            "Graded automatically: you covered {} key idea(s). A reviewer may refine this score.",
            matched.len()
        )),
        details: Some(GradeDetails {
            graded_by: Some(GradedBy::Heuristic),
            matched_keywords: Some(matched),
            ..GradeDetails::default()
        }),
    }
}
