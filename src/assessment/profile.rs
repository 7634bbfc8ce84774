use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assessment::catalog::StepCatalog;
use crate::assessment::error::ProfileExtractionError;
use crate::assessment::mastery::SkillMasteryRecord;
use crate::assessment::repository::{AssessmentRepository, SessionStatus};
use crate::assessment::types::{ProfileTarget, StepPayload};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goals {
    #[serde(default)]
    pub short_term: String,
    #[serde(default)]
    pub medium_term: String,
    #[serde(default)]
    pub long_term: String,
}

/// Interests and goals read out of a completed assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedProfile {
    pub user_id: String,
    pub interests: Vec<String>,
    pub goals: Goals,
    pub source_session_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Input to the recommendation engine. Assembled on demand, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default)]
    pub interests: Vec<String>,
    /// Skill key to mastery.
    #[serde(default)]
    pub assessment_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub goals: Goals,
}

impl StudentProfile {
    /// Only skills with at least one attempt carry a score; the prior is not evidence.
    pub fn assemble(records: &[SkillMasteryRecord], extracted: Option<&ExtractedProfile>) -> Self {
        let assessment_scores = records
            .iter()
            .filter(|r| r.attempts > 0)
            .map(|r| (r.skill_key.clone(), r.mastery))
            .collect();
        Self {
            interests: extracted.map(|p| p.interests.clone()).unwrap_or_default(),
            assessment_scores,
            goals: extracted.map(|p| p.goals.clone()).unwrap_or_default(),
        }
    }
}

/// Consumer of completed sessions.
#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(&self, user_id: &str, session_id: &str) -> Result<(), ProfileExtractionError>;
}

/// Reads questionnaire fields tagged with a profile target and stores the
/// result as the learner's extracted profile.
pub struct ResponseProfileExtractor {
    repository: Arc<dyn AssessmentRepository>,
    catalog: Arc<StepCatalog>,
}

impl ResponseProfileExtractor {
    pub fn new(repository: Arc<dyn AssessmentRepository>, catalog: Arc<StepCatalog>) -> Self {
        Self {
            repository,
            catalog,
        }
    }

    fn build(&self, user_id: &str, session_id: &str) -> Result<ExtractedProfile, ProfileExtractionError> {
        let session = self
            .repository
            .get_session(session_id)?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| ProfileExtractionError::SessionNotFound(session_id.to_string()))?;
        if session.status != SessionStatus::Completed {
            return Err(ProfileExtractionError::NotCompleted(session_id.to_string()));
        }

        let mut interests: Vec<String> = Vec::new();
        let mut goals = Goals::default();
        for response in self.repository.list_responses(session_id)? {
            let Some(StepPayload::Questionnaire(cfg)) = self.catalog.get(&response.step_id).map(|s| &s.payload)
            else {
                continue;
            };
            for field in &cfg.fields {
                let (Some(target), Some(raw)) = (field.profile_target, response.answer.get(&field.id)) else {
                    continue;
                };
                match target {
                    ProfileTarget::Interests => {
                        for tag in interest_tags(raw) {
                            if !interests.contains(&tag) {
                                interests.push(tag);
                            }
                        }
                    }
                    ProfileTarget::ShortTermGoal => goals.short_term = text_value(raw),
                    ProfileTarget::MediumTermGoal => goals.medium_term = text_value(raw),
                    ProfileTarget::LongTermGoal => goals.long_term = text_value(raw),
                }
            }
        }

        Ok(ExtractedProfile {
            user_id: user_id.to_string(),
            interests,
            goals,
            source_session_id: session_id.to_string(),
            updated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ProfileExtractor for ResponseProfileExtractor {
    async fn extract(&self, user_id: &str, session_id: &str) -> Result<(), ProfileExtractionError> {
        let profile = self.build(user_id, session_id)?;
        self.repository.save_extracted_profile(&profile)?;
        tracing::info!(
            user_id,
            session_id,
            interests = profile.interests.len(),
            "Student profile extracted"
        );
        Ok(())
    }
}

/// Accepts a list of tags or a comma separated string.
fn interest_tags(raw: &Value) -> Vec<String> {
    let tags: Vec<String> = match raw {
        Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn text_value(raw: &Value) -> String {
    raw.as_str().map(|s| s.trim().to_string()).unwrap_or_default()
}
