pub mod assessment_responses;
pub mod assessment_sessions;
pub mod skill_mastery;
pub mod student_profiles;

use crate::assessment::config::MasteryConfig;
use crate::assessment::mastery::{MasteryDelta, MasteryUpdate, SkillMasteryRecord};
use crate::assessment::profile::ExtractedProfile;
use crate::assessment::repository::{AssessmentRepository, AssessmentResponse, AssessmentSession};
use crate::store::{Store, StoreError};

impl AssessmentRepository for Store {
    fn get_session(&self, session_id: &str) -> Result<Option<AssessmentSession>, StoreError> {
        self.get_assessment_session(session_id)
    }

    fn create_or_resume_session(
        &self,
        session: &AssessmentSession,
    ) -> Result<(AssessmentSession, bool), StoreError> {
        self.create_or_resume_assessment_session(session)
    }

    fn update_session(&self, session: &AssessmentSession) -> Result<(), StoreError> {
        self.update_assessment_session(session)
    }

    fn find_active_session(
        &self,
        user_id: &str,
        session_type: &str,
    ) -> Result<Option<AssessmentSession>, StoreError> {
        self.find_active_assessment_session(user_id, session_type)
    }

    fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<AssessmentSession>, StoreError> {
        self.list_assessment_sessions_for_user(user_id)
    }

    fn list_in_progress_sessions(&self) -> Result<Vec<AssessmentSession>, StoreError> {
        self.list_in_progress_assessment_sessions()
    }

    fn upsert_response(&self, response: &AssessmentResponse) -> Result<(), StoreError> {
        self.upsert_assessment_response(response)
    }

    fn get_response(
        &self,
        session_id: &str,
        step_id: &str,
    ) -> Result<Option<AssessmentResponse>, StoreError> {
        self.get_assessment_response(session_id, step_id)
    }

    fn list_responses(&self, session_id: &str) -> Result<Vec<AssessmentResponse>, StoreError> {
        self.list_assessment_responses(session_id)
    }

    fn list_mastery(&self, user_id: &str) -> Result<Vec<SkillMasteryRecord>, StoreError> {
        self.list_skill_mastery(user_id)
    }

    fn apply_mastery_update(
        &self,
        user_id: &str,
        update: &MasteryUpdate,
        config: &MasteryConfig,
    ) -> Result<MasteryDelta, StoreError> {
        self.apply_skill_mastery_update(user_id, update, config)
    }

    fn get_extracted_profile(&self, user_id: &str) -> Result<Option<ExtractedProfile>, StoreError> {
        self.get_student_profile(user_id)
    }

    fn save_extracted_profile(&self, profile: &ExtractedProfile) -> Result<(), StoreError> {
        self.save_student_profile(profile)
    }
}
