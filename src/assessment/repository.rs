use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assessment::config::MasteryConfig;
use crate::assessment::mastery::{MasteryDelta, MasteryUpdate, SkillMasteryRecord};
use crate::assessment::profile::ExtractedProfile;
use crate::assessment::types::GradeResult;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSession {
    pub id: String,
    pub user_id: String,
    pub session_type: String,
    pub status: SessionStatus,
    /// A step id, or the summary sentinel once the last step has been answered.
    pub current_step: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandoned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    pub session_id: String,
    pub step_id: String,
    pub user_id: String,
    pub answer: Value,
    pub grade: GradeResult,
    #[serde(default)]
    pub mastery_deltas: Vec<MasteryDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_secs: Option<u32>,
    /// How many times this step has been answered in the session.
    #[serde(default = "first_submission")]
    pub submissions: u32,
    pub submitted_at: DateTime<Utc>,
}

fn first_submission() -> u32 {
    1
}

/// Persistence primitives the session state machine relies on.
pub trait AssessmentRepository: Send + Sync {
    fn get_session(&self, session_id: &str) -> Result<Option<AssessmentSession>, StoreError>;

    /// Stores `session` unless an in-progress session already exists for the
    /// same user and session type. Returns the session that holds the slot and
    /// whether it was just created.
    fn create_or_resume_session(
        &self,
        session: &AssessmentSession,
    ) -> Result<(AssessmentSession, bool), StoreError>;

    /// Overwrites a session. Terminal sessions release the active slot.
    fn update_session(&self, session: &AssessmentSession) -> Result<(), StoreError>;

    fn find_active_session(
        &self,
        user_id: &str,
        session_type: &str,
    ) -> Result<Option<AssessmentSession>, StoreError>;

    fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<AssessmentSession>, StoreError>;

    fn list_in_progress_sessions(&self) -> Result<Vec<AssessmentSession>, StoreError>;

    /// Insert or replace, keyed by `(session_id, step_id)`.
    fn upsert_response(&self, response: &AssessmentResponse) -> Result<(), StoreError>;

    fn get_response(
        &self,
        session_id: &str,
        step_id: &str,
    ) -> Result<Option<AssessmentResponse>, StoreError>;

    fn list_responses(&self, session_id: &str) -> Result<Vec<AssessmentResponse>, StoreError>;

    fn list_mastery(&self, user_id: &str) -> Result<Vec<SkillMasteryRecord>, StoreError>;

    /// Read-modify-write of one `(user, skill)` record, created from the prior
    /// on first use. `attempts` increments atomically.
    fn apply_mastery_update(
        &self,
        user_id: &str,
        update: &MasteryUpdate,
        config: &MasteryConfig,
    ) -> Result<MasteryDelta, StoreError>;

    fn get_extracted_profile(&self, user_id: &str) -> Result<Option<ExtractedProfile>, StoreError>;

    fn save_extracted_profile(&self, profile: &ExtractedProfile) -> Result<(), StoreError>;
}
