pub mod choice;
pub mod code;
pub mod questionnaire;
pub mod text;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assessment::config::GradingConfig;
use crate::assessment::error::GradingError;
use crate::assessment::types::{GradeResult, StepConfig, StepPayload, TestCase};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricRequest {
    pub prompt: String,
    pub answer: String,
    pub rubric: String,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricVerdict {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
}

/// External free-text grader (usually an LLM).
#[async_trait]
pub trait RubricGrader: Send + Sync {
    async fn grade_text(&self, request: &RubricRequest) -> Result<RubricVerdict, GradingError>;

    /// Quality bonus in [0,1] for a submission that already passes its tests.
    async fn code_quality(&self, code: &str, language: &str) -> Result<f64, GradingError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub actual_output: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub passed: bool,
    /// 0-100.
    pub score: f64,
    #[serde(default)]
    pub results: Vec<TestCaseResult>,
}

/// External sandbox that runs submitted code against test cases.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionReport, GradingError>;
}

/// Maps an answer for a step onto a [`GradeResult`]. Never fails: collaborator
/// errors fall back to heuristics or to a zero grade with feedback.
#[derive(Clone)]
pub struct StepGrader {
    config: GradingConfig,
    rubric: Option<Arc<dyn RubricGrader>>,
    executor: Option<Arc<dyn CodeExecutor>>,
}

impl StepGrader {
    pub fn new(
        config: GradingConfig,
        rubric: Option<Arc<dyn RubricGrader>>,
        executor: Option<Arc<dyn CodeExecutor>>,
    ) -> Self {
        Self {
            config,
            rubric,
            executor,
        }
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    pub async fn grade(&self, step: &StepConfig, answer: &Value) -> GradeResult {
        let result = match &step.payload {
            StepPayload::Questionnaire(cfg) => questionnaire::grade(cfg, answer, &self.config),
            StepPayload::Mcq(cfg) => choice::grade_mcq(step, cfg, answer, &self.config),
            StepPayload::MicroMcqBurst(cfg) => choice::grade_burst(step, cfg, answer, &self.config),
            StepPayload::DesignComparison(cfg) => {
                choice::grade_design_comparison(step, cfg, answer, &self.config)
            }
            StepPayload::ShortText(cfg) | StepPayload::DesignCritique(cfg) => {
                let confidence = self.config.ai_text_confidence;
                text::grade(step, cfg, answer, self.rubric.as_deref(), confidence, &self.config).await
            }
            StepPayload::CodeReview(cfg) => {
                let confidence = self.config.ai_code_review_confidence;
                text::grade(step, cfg, answer, self.rubric.as_deref(), confidence, &self.config).await
            }
            StepPayload::Code(cfg) => {
                code::grade(
                    step,
                    cfg,
                    answer,
                    self.executor.as_deref(),
                    self.rubric.as_deref(),
                    &self.config,
                )
                .await
            }
            StepPayload::Summary => GradeResult::not_graded(),
        };
        sanitize(result)
    }
}

fn unit_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Keeps every numeric field inside [0,1] whatever a collaborator returned.
fn sanitize(mut result: GradeResult) -> GradeResult {
    result.score = unit_or_zero(result.score);
    result.confidence = result.confidence.map(unit_or_zero);
    if let Some(scores) = result.skill_scores.as_mut() {
        scores.values_mut().for_each(|v| *v = unit_or_zero(*v));
    }
    result
}

/// Calls a collaborator, retrying `Unavailable` failures up to `retries` times.
pub(crate) async fn with_retry<T, F, Fut>(retries: u32, mut call: F) -> Result<T, GradingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GradingError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Err(GradingError::Unavailable(reason)) if attempt < retries => {
                attempt += 1;
                tracing::warn!(attempt, %reason, "Grading collaborator unavailable, retrying");
            }
            other => return other,
        }
    }
}

/// Deserializes an answer into the shape a grader expects; `None` on mismatch.
pub(crate) fn parse_answer<T: serde::de::DeserializeOwned>(answer: &Value) -> Option<T> {
    match serde_json::from_value(answer.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(error = %e, "answer does not match the expected shape");
            None
        }
    }
}
