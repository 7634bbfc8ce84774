use serde_json::Value;

use super::{parse_answer, with_retry, CodeExecutor, ExecutionReport, ExecutionRequest, RubricGrader};
use crate::assessment::config::GradingConfig;
use crate::assessment::types::*;

fn zero(feedback: impl Into<String>) -> GradeResult {
    GradeResult {
        score: 0.0,
        passed: false,
        skill_scores: None,
        confidence: None,
        feedback: Some(feedback.into()),
        details: Some(GradeDetails {
            graded_by: Some(GradedBy::Sandbox),
            ..GradeDetails::default()
        }),
    }
}

/// Weighted fraction of passed tests. Weights come from the step's test cases
/// by position; missing weights count as 1. Falls back to the sandbox's own
/// 0-100 score when it reports no per-test results.
pub fn base_score(report: &ExecutionReport, test_cases: &[TestCase]) -> f64 {
    if report.results.is_empty() {
        return (report.score / 100.0).clamp(0.0, 1.0);
    }
    let (earned, total) = report
        .results
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(earned, total), (i, result)| {
            let weight = test_cases
                .get(i)
                .and_then(|t| t.weight)
                .filter(|w| w.is_finite() && *w > 0.0)
                .unwrap_or(1.0);
            let earned = if result.passed { earned + weight } else { earned };
            (earned, total + weight)
        });
    if total > 0.0 {
        earned / total
    } else {
        0.0
    }
}

pub async fn grade(
    step: &StepConfig,
    cfg: &CodeConfig,
    answer: &Value,
    executor: Option<&dyn CodeExecutor>,
    rubric: Option<&dyn RubricGrader>,
    config: &GradingConfig,
) -> GradeResult {
    let submission = match answer {
        Value::String(code) => CodeAnswer {
            code: code.clone(),
            language: None,
        },
        other => parse_answer::<CodeAnswer>(other).unwrap_or_default(),
    };
    if submission.code.trim().is_empty() {
        return GradeResult::rejected("No code submitted");
    }

    let Some(executor) = executor else {
        return zero("Code execution is not available right now, so this step could not be scored.");
    };

    let request = ExecutionRequest {
        code: submission.code.clone(),
        language: submission.language.unwrap_or_else(|| cfg.language.clone()),
        test_cases: cfg.test_cases.clone(),
    };
    let report = match with_retry(config.collaborator_retries, || executor.execute(&request)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(step_id = %step.id, error = %e, "Code execution failed");
            return zero(format!("Your code could not be run: {e}"));
        }
    };

    let tests_total = report.results.len() as u32;
    let tests_passed = report.results.iter().filter(|r| r.passed).count() as u32;
    let all_passed = report.passed && (tests_total == 0 || tests_passed == tests_total);
    let mut score = base_score(&report, &cfg.test_cases);

    let mut quality_bonus = None;
    if all_passed {
        if let Some(grader) = rubric {
            match grader.code_quality(&request.code, &request.language).await {
                Ok(quality) if quality.is_finite() => {
                    let quality = quality.clamp(0.0, 1.0);
                    score = (score + quality * config.quality_bonus_factor).min(1.0);
                    quality_bonus = Some(quality);
                }
                Ok(quality) => {
                    tracing::debug!(step_id = %step.id, quality, "Ignoring non-finite quality score");
                }
                Err(e) => {
                    tracing::debug!(step_id = %step.id, error = %e, "Code quality review skipped");
                }
            }
        }
    }

    let feedback = if report.passed {
        format!("All tests passed ({tests_passed}/{tests_total}).")
    } else {
        let first_failure = report
            .results
            .iter()
            .find(|r| !r.passed)
            .map(|r| match &r.error {
                Some(err) => format!(" First failure: {err}"),
                None => format!(" Expected `{}` but got `{}`.", r.expected_output, r.actual_output),
            })
            .unwrap_or_default();
        format!("{tests_passed}/{tests_total} tests passed.{first_failure}")
    };

    GradeResult {
        score,
        passed: report.passed,
        skill_scores: Some(GradeResult::uniform_skill_scores(&step.skill_keys, score)),
        confidence: Some(config.code_confidence),
        feedback: Some(feedback),
        details: Some(GradeDetails {
            graded_by: Some(GradedBy::Sandbox),
            tests_passed: Some(tests_passed),
            tests_total: Some(tests_total),
            quality_bonus,
            ..GradeDetails::default()
        }),
    }
}
