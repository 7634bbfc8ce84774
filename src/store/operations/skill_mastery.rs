use crate::assessment::config::MasteryConfig;
use crate::assessment::mastery::{self, MasteryDelta, MasteryUpdate, SkillMasteryRecord};
use crate::store::keys;
use crate::store::{Store, StoreError};

const MAX_CAS_RETRIES: u32 = 16;

impl Store {
    pub fn get_skill_mastery(&self, user_id: &str, skill_key: &str) -> Result<Option<SkillMasteryRecord>, StoreError> {
        let key = keys::mastery_key(user_id, skill_key);
        match self.skill_mastery.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_skill_mastery(&self, user_id: &str) -> Result<Vec<SkillMasteryRecord>, StoreError> {
        let prefix = keys::mastery_prefix(user_id);
        self.skill_mastery
            .scan_prefix(prefix.as_bytes())
            .map(|item| {
                let (_, raw) = item?;
                Self::deserialize(&raw)
            })
            .collect()
    }

    /// Compare-and-swap loop so concurrent updates to one skill never lose an
    /// attempt.
    pub fn apply_skill_mastery_update(
        &self,
        user_id: &str,
        update: &MasteryUpdate,
        config: &MasteryConfig,
    ) -> Result<MasteryDelta, StoreError> {
        let key = keys::mastery_key(user_id, &update.skill_key);

        for _ in 0..MAX_CAS_RETRIES {
            let current = self.skill_mastery.get(key.as_bytes())?;
            let before = match &current {
                Some(raw) => Self::deserialize(raw)?,
                None => SkillMasteryRecord::prior(user_id, &update.skill_key, config),
            };
            let after = mastery::apply_update(&before, update, config);
            let bytes = Self::serialize(&after)?;

            match self
                .skill_mastery
                .compare_and_swap(key.as_bytes(), current.as_ref(), Some(bytes))?
            {
                Ok(()) => return Ok(MasteryDelta::between(&before, &after)),
                Err(_) => {
                    tracing::debug!(user_id, skill_key = %update.skill_key, "Mastery CAS conflict, retrying");
                }
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: "skill_mastery".to_string(),
            key,
            attempts: MAX_CAS_RETRIES,
        })
    }
}
