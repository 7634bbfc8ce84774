pub const ASSESSMENT_SESSIONS: &str = "assessment_sessions";
pub const ASSESSMENT_RESPONSES: &str = "assessment_responses";
pub const SKILL_MASTERY: &str = "skill_mastery";
pub const STUDENT_PROFILES: &str = "student_profiles";
pub const META: &str = "meta";
