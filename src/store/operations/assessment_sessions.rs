use crate::assessment::repository::{AssessmentSession, SessionStatus};
use crate::store::keys;
use crate::store::{transaction_error, Store, StoreError};

const MAX_SLOT_ATTEMPTS: u32 = 8;

impl Store {
    pub fn get_assessment_session(&self, session_id: &str) -> Result<Option<AssessmentSession>, StoreError> {
        let key = keys::session_key(session_id);
        match self.assessment_sessions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn insert_session_with_user_index(&self, session: &AssessmentSession) -> Result<(), StoreError> {
        let key_bytes = keys::session_key(&session.id).into_bytes();
        let index_bytes = keys::session_user_index_key(&session.user_id, &session.id).into_bytes();
        let session_bytes = Self::serialize(session)?;

        self.assessment_sessions
            .transaction(move |tx| {
                tx.insert(key_bytes.as_slice(), session_bytes.as_slice())?;
                tx.insert(index_bytes.as_slice(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(transaction_error)
    }

    /// Claims the active slot for `(user, session type)` with compare-and-swap.
    /// When another in-progress session already holds it, that session is
    /// returned instead. A slot left pointing at a finished or missing session
    /// is taken over.
    pub fn create_or_resume_assessment_session(
        &self,
        session: &AssessmentSession,
    ) -> Result<(AssessmentSession, bool), StoreError> {
        let active_key = keys::active_session_key(&session.user_id, &session.session_type);
        let mut expected: Option<sled::IVec> = None;

        for _ in 0..MAX_SLOT_ATTEMPTS {
            let swapped = self.assessment_sessions.compare_and_swap(
                active_key.as_bytes(),
                expected.as_ref(),
                Some(session.id.as_bytes()),
            )?;

            let current = match swapped {
                Ok(()) => {
                    if let Err(e) = self.insert_session_with_user_index(session) {
                        let _ = self.assessment_sessions.compare_and_swap(
                            active_key.as_bytes(),
                            Some(session.id.as_bytes()),
                            None::<&[u8]>,
                        );
                        return Err(e);
                    }
                    return Ok((session.clone(), true));
                }
                Err(conflict) => conflict.current,
            };

            let Some(holder_id) = current else {
                expected = None;
                continue;
            };
            let holder = std::str::from_utf8(&holder_id)
                .ok()
                .map(|id| self.get_assessment_session(id))
                .transpose()?
                .flatten();
            match holder {
                Some(existing) if existing.status == SessionStatus::InProgress => {
                    return Ok((existing, false));
                }
                _ => {
                    tracing::warn!(key = %active_key, "Reclaiming stale active-session slot");
                    expected = Some(holder_id);
                }
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: "assessment_session_slot".to_string(),
            key: active_key,
            attempts: MAX_SLOT_ATTEMPTS,
        })
    }

    pub fn update_assessment_session(&self, session: &AssessmentSession) -> Result<(), StoreError> {
        let key = keys::session_key(&session.id);
        if self.assessment_sessions.get(key.as_bytes())?.is_none() {
            return Err(StoreError::NotFound {
                entity: "assessment_session".to_string(),
                key: session.id.clone(),
            });
        }
        self.assessment_sessions
            .insert(key.as_bytes(), Self::serialize(session)?)?;

        if session.status.is_terminal() {
            let active_key = keys::active_session_key(&session.user_id, &session.session_type);
            // Only release the slot if this session still holds it.
            let _ = self.assessment_sessions.compare_and_swap(
                active_key.as_bytes(),
                Some(session.id.as_bytes()),
                None::<&[u8]>,
            )?;
        }
        Ok(())
    }

    pub fn find_active_assessment_session(
        &self,
        user_id: &str,
        session_type: &str,
    ) -> Result<Option<AssessmentSession>, StoreError> {
        let active_key = keys::active_session_key(user_id, session_type);
        let Some(raw_id) = self.assessment_sessions.get(active_key.as_bytes())? else {
            return Ok(None);
        };
        let session_id = match std::str::from_utf8(&raw_id) {
            Ok(id) => id.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid UTF-8 in active session index");
                return Ok(None);
            }
        };
        Ok(self
            .get_assessment_session(&session_id)?
            .filter(|s| s.status == SessionStatus::InProgress))
    }

    pub fn list_assessment_sessions_for_user(&self, user_id: &str) -> Result<Vec<AssessmentSession>, StoreError> {
        let prefix = keys::session_user_index_prefix(user_id);
        let mut sessions = Vec::new();
        for item in self.assessment_sessions.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let Some(session_id) = k.get(prefix.len()..).and_then(|id| std::str::from_utf8(id).ok()) else {
                continue;
            };
            if let Some(session) = self.get_assessment_session(session_id)? {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    pub fn list_in_progress_assessment_sessions(&self) -> Result<Vec<AssessmentSession>, StoreError> {
        let mut sessions = Vec::new();
        for item in self.assessment_sessions.iter() {
            let (key, value) = item?;
            if keys::is_session_index_key(&key) {
                continue;
            }
            let session: AssessmentSession = Self::deserialize(&value)?;
            if session.status == SessionStatus::InProgress {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }
}
