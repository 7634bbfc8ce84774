use crate::assessment::repository::AssessmentResponse;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn upsert_assessment_response(&self, response: &AssessmentResponse) -> Result<(), StoreError> {
        let key = keys::response_key(&response.session_id, &response.step_id);
        self.assessment_responses
            .insert(key.as_bytes(), Self::serialize(response)?)?;
        Ok(())
    }

    pub fn get_assessment_response(
        &self,
        session_id: &str,
        step_id: &str,
    ) -> Result<Option<AssessmentResponse>, StoreError> {
        let key = keys::response_key(session_id, step_id);
        match self.assessment_responses.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_assessment_responses(&self, session_id: &str) -> Result<Vec<AssessmentResponse>, StoreError> {
        let prefix = keys::response_prefix(session_id);
        self.assessment_responses
            .scan_prefix(prefix.as_bytes())
            .map(|item| {
                let (_, raw) = item?;
                Self::deserialize(&raw)
            })
            .collect()
    }
}
