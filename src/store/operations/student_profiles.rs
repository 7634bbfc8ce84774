use crate::assessment::profile::ExtractedProfile;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn get_student_profile(&self, user_id: &str) -> Result<Option<ExtractedProfile>, StoreError> {
        let key = keys::student_profile_key(user_id);
        match self.student_profiles.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save_student_profile(&self, profile: &ExtractedProfile) -> Result<(), StoreError> {
        let key = keys::student_profile_key(&profile.user_id);
        self.student_profiles
            .insert(key.as_bytes(), Self::serialize(profile)?)?;
        Ok(())
    }
}
