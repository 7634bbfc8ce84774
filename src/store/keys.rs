pub const ACTIVE_INDEX_PREFIX: &str = "active:";
pub const USER_INDEX_PREFIX: &str = "user:";

pub fn session_key(session_id: &str) -> String {
    session_id.to_string()
}

/// Points at the single in-progress session for a user and session type.
pub fn active_session_key(user_id: &str, session_type: &str) -> String {
    format!("{}{}:{}", ACTIVE_INDEX_PREFIX, user_id, session_type)
}

pub fn session_user_index_key(user_id: &str, session_id: &str) -> String {
    format!("{}{}:{}", USER_INDEX_PREFIX, user_id, session_id)
}

pub fn session_user_index_prefix(user_id: &str) -> String {
    format!("{}{}:", USER_INDEX_PREFIX, user_id)
}

/// Index entries share the sessions tree with the records themselves.
pub fn is_session_index_key(key: &[u8]) -> bool {
    key.starts_with(ACTIVE_INDEX_PREFIX.as_bytes()) || key.starts_with(USER_INDEX_PREFIX.as_bytes())
}

pub fn response_key(session_id: &str, step_id: &str) -> String {
    format!("{}:{}", session_id, step_id)
}

pub fn response_prefix(session_id: &str) -> String {
    format!("{}:", session_id)
}

pub fn mastery_key(user_id: &str, skill_key: &str) -> String {
    format!("{}:{}", user_id, skill_key)
}

pub fn mastery_prefix(user_id: &str) -> String {
    format!("{}:", user_id)
}

pub fn student_profile_key(user_id: &str) -> String {
    user_id.to_string()
}
