use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use assessment_backend::assessment::config::{EngineConfig, MasteryConfig};
use assessment_backend::assessment::error::GradingError;
use assessment_backend::assessment::grader::{
    CodeExecutor, ExecutionReport, ExecutionRequest, RubricGrader, RubricRequest, RubricVerdict,
    StepGrader, TestCaseResult,
};
use assessment_backend::assessment::mastery::{MasteryDelta, MasteryUpdate, SkillMasteryRecord};
use assessment_backend::assessment::profile::ExtractedProfile;
use assessment_backend::assessment::repository::{
    AssessmentRepository, AssessmentResponse, AssessmentSession,
};
use assessment_backend::assessment::{AssessmentEngine, StepCatalog};
use assessment_backend::store::{Store, StoreError};
use assessment_backend::workers::profile_extraction::{ProfileExtractionQueue, ProfileJob};
use tempfile::TempDir;
use tokio::sync::mpsc;

// Answers for the built-in onboarding catalog.

pub fn background_answer() -> Value {
    json!({
        "programming_experience": 3,
        "javascript_comfort": "comfortable",
        "git_comfort": "basic",
        "html_css_experience": 4,
        "interests": ["games", "web-apps"],
        "goal_short": "Finish a JavaScript course",
        "goal_medium": "Ship a small browser game",
        "goal_long": "Work as a web developer"
    })
}

pub fn burst_answer(correct: usize) -> Value {
    let right = [("q1", "b"), ("q2", "c"), ("q3", "b")];
    let wrong = [("q1", "a"), ("q2", "a"), ("q3", "a")];
    let answers: serde_json::Map<String, Value> = (0..3)
        .map(|i| {
            let (id, pick) = if i < correct { right[i] } else { wrong[i] };
            (id.to_string(), Value::String(pick.to_string()))
        })
        .collect();
    json!({ "answers": answers })
}

pub fn mcq_answer(option: &str) -> Value {
    json!({ "selectedOptionId": option })
}

pub fn closure_explanation() -> Value {
    json!({
        "text": "A closure is a function that remembers the variables from the outer scope where it \
                 was created. For example an inner function returned from a counter keeps its own \
                 count variable even after the outer function has finished running."
    })
}

pub fn sum_evens_code() -> Value {
    json!({
        "code": "function sumEvens(n) { return n.filter(x => x % 2 === 0).reduce((a, b) => a + b, 0); }",
        "language": "javascript"
    })
}

// Collaborator fakes.

/// Rubric grader that always awards a fixed fraction of the maximum.
pub struct FixedRubric {
    pub ratio: f64,
    pub quality: f64,
}

#[async_trait]
impl RubricGrader for FixedRubric {
    async fn grade_text(&self, request: &RubricRequest) -> Result<RubricVerdict, GradingError> {
        Ok(RubricVerdict {
            score: request.max_score * self.ratio,
            feedback: "fixed".to_string(),
        })
    }

    async fn code_quality(&self, _code: &str, _language: &str) -> Result<f64, GradingError> {
        Ok(self.quality)
    }
}

/// Rubric grader that is always down.
pub struct OfflineRubric;

#[async_trait]
impl RubricGrader for OfflineRubric {
    async fn grade_text(&self, _request: &RubricRequest) -> Result<RubricVerdict, GradingError> {
        Err(GradingError::Unavailable("offline".to_string()))
    }

    async fn code_quality(&self, _code: &str, _language: &str) -> Result<f64, GradingError> {
        Err(GradingError::Unavailable("offline".to_string()))
    }
}

/// Sandbox that passes or fails every test case.
pub struct UniformRunner {
    pub pass: bool,
}

#[async_trait]
impl CodeExecutor for UniformRunner {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionReport, GradingError> {
        let results: Vec<TestCaseResult> = request
            .test_cases
            .iter()
            .map(|tc| TestCaseResult {
                input: tc.input.clone(),
                expected_output: tc.expected_output.clone(),
                actual_output: if self.pass {
                    tc.expected_output.clone()
                } else {
                    String::new()
                },
                passed: self.pass,
                error: None,
            })
            .collect();
        Ok(ExecutionReport {
            passed: self.pass,
            score: if self.pass { 100.0 } else { 0.0 },
            results,
        })
    }
}

/// Store wrapper whose mastery writes fail for one skill.
pub struct FlakyMasteryRepo {
    pub inner: Arc<Store>,
    pub failing_skill: String,
    pub failures: AtomicU32,
}

impl FlakyMasteryRepo {
    pub fn new(inner: Arc<Store>, failing_skill: &str) -> Self {
        Self {
            inner,
            failing_skill: failing_skill.to_string(),
            failures: AtomicU32::new(0),
        }
    }
}

impl AssessmentRepository for FlakyMasteryRepo {
    fn get_session(&self, session_id: &str) -> Result<Option<AssessmentSession>, StoreError> {
        self.inner.get_session(session_id)
    }

    fn create_or_resume_session(
        &self,
        session: &AssessmentSession,
    ) -> Result<(AssessmentSession, bool), StoreError> {
        self.inner.create_or_resume_session(session)
    }

    fn update_session(&self, session: &AssessmentSession) -> Result<(), StoreError> {
        self.inner.update_session(session)
    }

    fn find_active_session(
        &self,
        user_id: &str,
        session_type: &str,
    ) -> Result<Option<AssessmentSession>, StoreError> {
        self.inner.find_active_session(user_id, session_type)
    }

    fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<AssessmentSession>, StoreError> {
        self.inner.list_sessions_for_user(user_id)
    }

    fn list_in_progress_sessions(&self) -> Result<Vec<AssessmentSession>, StoreError> {
        self.inner.list_in_progress_sessions()
    }

    fn upsert_response(&self, response: &AssessmentResponse) -> Result<(), StoreError> {
        self.inner.upsert_response(response)
    }

    fn get_response(
        &self,
        session_id: &str,
        step_id: &str,
    ) -> Result<Option<AssessmentResponse>, StoreError> {
        self.inner.get_response(session_id, step_id)
    }

    fn list_responses(&self, session_id: &str) -> Result<Vec<AssessmentResponse>, StoreError> {
        self.inner.list_responses(session_id)
    }

    fn list_mastery(&self, user_id: &str) -> Result<Vec<SkillMasteryRecord>, StoreError> {
        self.inner.list_mastery(user_id)
    }

    fn apply_mastery_update(
        &self,
        user_id: &str,
        update: &MasteryUpdate,
        config: &MasteryConfig,
    ) -> Result<MasteryDelta, StoreError> {
        if update.skill_key == self.failing_skill {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Conflict {
                entity: "skill_mastery".to_string(),
                key: update.skill_key.clone(),
            });
        }
        self.inner.apply_mastery_update(user_id, update, config)
    }

    fn get_extracted_profile(&self, user_id: &str) -> Result<Option<ExtractedProfile>, StoreError> {
        self.inner.get_extracted_profile(user_id)
    }

    fn save_extracted_profile(&self, profile: &ExtractedProfile) -> Result<(), StoreError> {
        self.inner.save_extracted_profile(profile)
    }
}

pub struct EngineHarness {
    pub engine: AssessmentEngine,
    pub store: Arc<Store>,
    pub jobs: mpsc::Receiver<ProfileJob>,
    _dir: TempDir,
}

pub fn open_store(dir: &TempDir) -> Arc<Store> {
    let store = Store::open(dir.path().join("engine.sled").to_str().expect("utf-8 path"))
        .expect("open store");
    store.run_migrations().expect("migrations");
    Arc::new(store)
}

/// Engine over the built-in catalog, a fresh store and the given collaborators.
pub fn engine_with(
    rubric: Option<Arc<dyn RubricGrader>>,
    executor: Option<Arc<dyn CodeExecutor>>,
) -> EngineHarness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    engine_over(store.clone(), store, rubric, executor, dir)
}

pub fn engine_over(
    store: Arc<Store>,
    repository: Arc<dyn AssessmentRepository>,
    rubric: Option<Arc<dyn RubricGrader>>,
    executor: Option<Arc<dyn CodeExecutor>>,
    dir: TempDir,
) -> EngineHarness {
    let catalog = StepCatalog::builtin().expect("builtin catalog");
    engine_over_catalog(store, repository, catalog, rubric, executor, dir)
}

/// Engine over a caller-supplied catalog and a fresh store.
pub fn engine_for_catalog(catalog: StepCatalog) -> EngineHarness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    engine_over_catalog(store.clone(), store, catalog, None, None, dir)
}

fn engine_over_catalog(
    store: Arc<Store>,
    repository: Arc<dyn AssessmentRepository>,
    catalog: StepCatalog,
    rubric: Option<Arc<dyn RubricGrader>>,
    executor: Option<Arc<dyn CodeExecutor>>,
    dir: TempDir,
) -> EngineHarness {
    let config = EngineConfig::default();
    let grader = StepGrader::new(config.grading.clone(), rubric, executor);
    let (queue, jobs) = ProfileExtractionQueue::channel(16);
    let engine = AssessmentEngine::new(
        repository,
        Arc::new(catalog),
        grader,
        config,
        "onboarding",
    )
    .with_profile_queue(queue);
    EngineHarness {
        engine,
        store,
        jobs,
        _dir: dir,
    }
}
