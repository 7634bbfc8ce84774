use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::assessment::catalog::StepCatalog;
use crate::assessment::config::EngineConfig;
use crate::assessment::error::EngineError;
use crate::assessment::grader::StepGrader;
use crate::assessment::mastery::{self, MasteryDelta, SkillProfileSummary};
use crate::assessment::profile::StudentProfile;
use crate::assessment::repository::{
    AssessmentRepository, AssessmentResponse, AssessmentSession, SessionStatus,
};
use crate::assessment::skip_rules;
use crate::assessment::types::{GradeResult, StepConfig, StepKind, SUMMARY_STEP};
use crate::workers::profile_extraction::{ProfileExtractionQueue, ProfileJob};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub session: AssessmentSession,
    pub current_step: Option<StepConfig>,
    pub is_resuming: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub session: AssessmentSession,
    pub grade: GradeResult,
    pub mastery_deltas: Vec<MasteryDelta>,
    pub next_step: Option<StepConfig>,
    pub skipped_step_id: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    /// 1-based position of the current step; `total_steps` once on the summary.
    pub step_index: usize,
    pub total_steps: usize,
    pub answered_steps: usize,
    pub remaining_minutes: u32,
    pub percent_complete: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session: AssessmentSession,
    pub progress: SessionProgress,
}

/// The session state machine. Safe to share across requests; operations on
/// the same session are serialized by a per-session lock.
pub struct AssessmentEngine {
    repository: Arc<dyn AssessmentRepository>,
    catalog: Arc<StepCatalog>,
    grader: StepGrader,
    config: EngineConfig,
    default_session_type: String,
    profile_queue: Option<ProfileExtractionQueue>,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssessmentEngine {
    pub fn new(
        repository: Arc<dyn AssessmentRepository>,
        catalog: Arc<StepCatalog>,
        grader: StepGrader,
        config: EngineConfig,
        default_session_type: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            catalog,
            grader,
            config,
            default_session_type: default_session_type.into(),
            profile_queue: None,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_profile_queue(mut self, queue: ProfileExtractionQueue) -> Self {
        self.profile_queue = Some(queue);
        self
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn catalog_handle(&self) -> Arc<StepCatalog> {
        self.catalog.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn AssessmentRepository> {
        &self.repository
    }

    async fn acquire_session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        if locks.len() > 1000 {
            locks.retain(|_, v| Arc::strong_count(v) > 1);
        }
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Loads a session owned by `user_id`. Someone else's session is reported
    /// as missing.
    fn load_session(&self, user_id: &str, session_id: &str) -> Result<AssessmentSession, EngineError> {
        self.repository
            .get_session(session_id)?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn ensure_in_progress(session: &AssessmentSession) -> Result<(), EngineError> {
        match session.status {
            SessionStatus::InProgress => Ok(()),
            SessionStatus::Completed => Err(EngineError::SessionAlreadyCompleted(session.id.clone())),
            SessionStatus::Abandoned => Err(EngineError::SessionAbandoned(session.id.clone())),
        }
    }

    fn redacted_step(&self, step_id: Option<&str>) -> Option<StepConfig> {
        step_id
            .filter(|id| *id != SUMMARY_STEP)
            .and_then(|id| self.catalog.get(id))
            .map(StepConfig::redacted)
    }

    /// Starts a session or resumes the one already in progress for this user
    /// and session type.
    pub async fn start(&self, user_id: &str, session_type: Option<&str>) -> Result<StartOutcome, EngineError> {
        let session_type = session_type
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_session_type);

        if let Some(existing) = self.repository.find_active_session(user_id, session_type)? {
            tracing::info!(user_id, session_id = %existing.id, "Resuming assessment session");
            return Ok(StartOutcome {
                current_step: self.redacted_step(existing.current_step.as_deref()),
                session: existing,
                is_resuming: true,
            });
        }

        let now = Utc::now();
        let candidate = AssessmentSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_type: session_type.to_string(),
            status: SessionStatus::InProgress,
            current_step: Some(self.catalog.first().id.clone()),
            started_at: now,
            updated_at: now,
            completed_at: None,
            abandoned_at: None,
        };
        let (session, created) = self.repository.create_or_resume_session(&candidate)?;
        if created {
            tracing::info!(user_id, session_id = %session.id, session_type, "Assessment session started");
        }
        Ok(StartOutcome {
            current_step: self.redacted_step(session.current_step.as_deref()),
            session,
            is_resuming: !created,
        })
    }

    pub async fn submit_answer(
        &self,
        user_id: &str,
        session_id: &str,
        step_id: &str,
        answer: Value,
        time_spent_secs: Option<u32>,
    ) -> Result<SubmissionOutcome, EngineError> {
        let lock = self.acquire_session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.load_session(user_id, session_id)?;
        Self::ensure_in_progress(&session)?;
        let step = self
            .catalog
            .get(step_id)
            .ok_or_else(|| EngineError::StepNotFound(step_id.to_string()))?;

        let grade = self.grader.grade(step, &answer).await;

        let mut mastery_deltas = Vec::new();
        for update in mastery::derive_updates(&grade, &self.config.mastery) {
            match self
                .repository
                .apply_mastery_update(user_id, &update, &self.config.mastery)
            {
                Ok(delta) => mastery_deltas.push(delta),
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        session_id,
                        skill_key = %update.skill_key,
                        error = %e,
                        "Mastery update failed; dropping this skill"
                    );
                }
            }
        }

        let submissions = self
            .repository
            .get_response(session_id, step_id)?
            .map_or(1, |r| r.submissions.saturating_add(1));
        self.repository.upsert_response(&AssessmentResponse {
            session_id: session_id.to_string(),
            step_id: step_id.to_string(),
            user_id: user_id.to_string(),
            answer,
            grade: grade.clone(),
            mastery_deltas: mastery_deltas.clone(),
            time_spent_secs,
            submissions,
            submitted_at: Utc::now(),
        })?;

        let (next, skipped_step_id) = self.resolve_next(session_id, step_id)?;
        let completed = self.catalog.is_last(step_id)
            || next.map_or(true, |n| n.kind() == StepKind::Summary);

        let now = Utc::now();
        session.updated_at = now;
        if completed {
            session.status = SessionStatus::Completed;
            session.current_step = Some(SUMMARY_STEP.to_string());
            session.completed_at = Some(now);
        } else {
            session.current_step = next.map(|n| n.id.clone());
        }
        self.repository.update_session(&session)?;

        tracing::info!(
            user_id,
            session_id,
            step_id,
            score = grade.score,
            passed = grade.passed,
            skipped = skipped_step_id.as_deref().unwrap_or(""),
            completed,
            "Assessment answer recorded"
        );

        if completed {
            self.enqueue_profile_extraction(user_id, session_id);
        }

        Ok(SubmissionOutcome {
            next_step: if completed {
                None
            } else {
                next.map(StepConfig::redacted)
            },
            session,
            grade,
            mastery_deltas,
            skipped_step_id,
            completed,
        })
    }

    /// Step after `step_id`, hopping over it once if its skip rule fires.
    /// A step reached by the hop is not evaluated again.
    fn resolve_next(
        &self,
        session_id: &str,
        step_id: &str,
    ) -> Result<(Option<&StepConfig>, Option<String>), EngineError> {
        let Some(next) = self.catalog.next(step_id) else {
            return Ok((None, None));
        };
        let Some(rule) = &next.skip_rules else {
            return Ok((Some(next), None));
        };
        let dependency = self
            .repository
            .get_response(session_id, &rule.depends_on_step_id)?
            .map(|r| r.grade);
        if skip_rules::should_skip(rule, dependency.as_ref()) {
            tracing::debug!(session_id, skipped = %next.id, "Skip rule fired");
            Ok((self.catalog.next(&next.id), Some(next.id.clone())))
        } else {
            Ok((Some(next), None))
        }
    }

    fn enqueue_profile_extraction(&self, user_id: &str, session_id: &str) {
        let Some(queue) = &self.profile_queue else {
            return;
        };
        let job = ProfileJob {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        };
        if let Err(e) = queue.submit(job) {
            tracing::error!(user_id, session_id, error = %e, "Failed to enqueue profile extraction");
        }
    }

    /// Rewinds one step in catalog order. Returns `None` without changes when
    /// already on the first step.
    pub async fn go_to_previous(&self, user_id: &str, session_id: &str) -> Result<Option<StepConfig>, EngineError> {
        let lock = self.acquire_session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.load_session(user_id, session_id)?;
        Self::ensure_in_progress(&session)?;

        let current = session
            .current_step
            .clone()
            .unwrap_or_else(|| self.catalog.first().id.clone());
        let Some(previous) = self.catalog.previous(&current) else {
            return Ok(None);
        };

        session.current_step = Some(previous.id.clone());
        session.updated_at = Utc::now();
        self.repository.update_session(&session)?;
        tracing::info!(user_id, session_id, step_id = %previous.id, "Moved back one step");
        Ok(Some(previous.redacted()))
    }

    /// Marks the session abandoned whatever its state.
    pub async fn abandon(&self, user_id: &str, session_id: &str) -> Result<AssessmentSession, EngineError> {
        let lock = self.acquire_session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.load_session(user_id, session_id)?;
        let now = Utc::now();
        session.status = SessionStatus::Abandoned;
        session.abandoned_at = Some(now);
        session.updated_at = now;
        self.repository.update_session(&session)?;
        tracing::info!(user_id, session_id, "Assessment session abandoned");
        Ok(session)
    }

    pub fn get_session(&self, user_id: &str, session_id: &str) -> Result<SessionView, EngineError> {
        let session = self.load_session(user_id, session_id)?;
        let progress = self.progress_of(&session)?;
        Ok(SessionView { session, progress })
    }

    /// Redacted current step; `None` once the session has reached the summary.
    pub fn current_step(&self, user_id: &str, session_id: &str) -> Result<Option<StepConfig>, EngineError> {
        let session = self.load_session(user_id, session_id)?;
        Ok(self.redacted_step(session.current_step.as_deref()))
    }

    pub fn progress(&self, user_id: &str, session_id: &str) -> Result<SessionProgress, EngineError> {
        let session = self.load_session(user_id, session_id)?;
        self.progress_of(&session)
    }

    fn progress_of(&self, session: &AssessmentSession) -> Result<SessionProgress, EngineError> {
        let total_steps = self.catalog.len();
        let answered_steps = self.repository.list_responses(&session.id)?.len();
        let position = session
            .current_step
            .as_deref()
            .and_then(|id| self.catalog.position(id));

        let (step_index, remaining_minutes) = match (session.current_step.as_deref(), position) {
            (Some(SUMMARY_STEP), _) => (total_steps, 0),
            (Some(id), Some(pos)) => (pos + 1, self.catalog.remaining_minutes_from(id)),
            _ => (0, 0),
        };
        let finished = session.status == SessionStatus::Completed
            || session.current_step.as_deref() == Some(SUMMARY_STEP);
        let percent_complete = if finished {
            100.0
        } else if total_steps == 0 {
            0.0
        } else {
            (step_index.saturating_sub(1) as f64 / total_steps as f64 * 100.0).round()
        };

        Ok(SessionProgress {
            step_index,
            total_steps,
            answered_steps,
            remaining_minutes,
            percent_complete,
        })
    }

    pub fn list_responses(&self, user_id: &str, session_id: &str) -> Result<Vec<AssessmentResponse>, EngineError> {
        let session = self.load_session(user_id, session_id)?;
        let mut responses = self.repository.list_responses(&session.id)?;
        responses.sort_by_key(|r| self.catalog.position(&r.step_id).unwrap_or(usize::MAX));
        Ok(responses)
    }

    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<AssessmentSession>, EngineError> {
        let mut sessions = self.repository.list_sessions_for_user(user_id)?;
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    pub fn skill_profile(&self, user_id: &str) -> Result<SkillProfileSummary, EngineError> {
        Ok(mastery::summarize(self.repository.list_mastery(user_id)?))
    }

    pub fn student_profile(&self, user_id: &str) -> Result<StudentProfile, EngineError> {
        let records = self.repository.list_mastery(user_id)?;
        let extracted = self.repository.get_extracted_profile(user_id)?;
        Ok(StudentProfile::assemble(&records, extracted.as_ref()))
    }

    /// Abandons in-progress sessions untouched since `cutoff`. Returns how many
    /// were expired.
    pub async fn expire_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<u32, EngineError> {
        let mut expired = 0u32;
        for stale in self
            .repository
            .list_in_progress_sessions()?
            .into_iter()
            .filter(|s| s.updated_at < cutoff)
        {
            let lock = self.acquire_session_lock(&stale.id).await;
            let _guard = lock.lock().await;

            // Re-read under the lock; an answer may have landed meanwhile.
            let Some(mut session) = self.repository.get_session(&stale.id)? else {
                continue;
            };
            if session.status != SessionStatus::InProgress || session.updated_at >= cutoff {
                continue;
            }
            let now = Utc::now();
            session.status = SessionStatus::Abandoned;
            session.abandoned_at = Some(now);
            session.updated_at = now;
            self.repository.update_session(&session)?;
            expired += 1;
        }
        Ok(expired)
    }
}
