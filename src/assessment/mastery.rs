//! Confidence-weighted mastery updates and dimension aggregation.
//!
//! Low-confidence skills move quickly toward new evidence; well-estimated
//! skills resist single noisy observations. Confidence approaches 1 but a
//! single update never reaches it from below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::config::MasteryConfig;
use crate::assessment::taxonomy::{DimensionKey, TAXONOMY};
use crate::assessment::types::GradeResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillMasteryRecord {
    pub user_id: String,
    pub skill_key: String,
    pub mastery: f64,
    pub confidence: f64,
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl SkillMasteryRecord {
    /// Record for a skill that has never been assessed.
    pub fn prior(user_id: &str, skill_key: &str, config: &MasteryConfig) -> Self {
        Self {
            user_id: user_id.to_string(),
            skill_key: skill_key.to_string(),
            mastery: config.prior_mastery,
            confidence: 0.0,
            attempts: 0,
            updated_at: Utc::now(),
        }
    }
}

/// One piece of evidence for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryUpdate {
    pub skill_key: String,
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryDelta {
    pub skill_key: String,
    pub previous_mastery: f64,
    pub new_mastery: f64,
    pub previous_confidence: f64,
    pub new_confidence: f64,
    pub attempts: u32,
}

impl MasteryDelta {
    pub fn between(before: &SkillMasteryRecord, after: &SkillMasteryRecord) -> Self {
        Self {
            skill_key: after.skill_key.clone(),
            previous_mastery: before.mastery,
            new_mastery: after.mastery,
            previous_confidence: before.confidence,
            new_confidence: after.confidence,
            attempts: after.attempts,
        }
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Pure update of `(mastery, confidence)` given one score and its weight.
pub fn update_estimate(
    mastery: f64,
    confidence: f64,
    score: f64,
    weight: f64,
    config: &MasteryConfig,
) -> (f64, f64) {
    let (mastery, confidence) = (unit(mastery), unit(confidence));
    let (score, weight) = (unit(score), unit(weight));

    let confidence_factor = 1.0 - confidence * config.confidence_damping;
    let learning_rate = config.base_learning_rate * confidence_factor * weight;
    let new_mastery = unit(mastery + (score - mastery) * learning_rate);

    let confidence_gain = (1.0 - confidence) * config.confidence_gain * weight;
    let new_confidence = unit(confidence + confidence_gain);
    (new_mastery, new_confidence)
}

/// Applies one update to a stored record, incrementing `attempts`.
pub fn apply_update(
    record: &SkillMasteryRecord,
    update: &MasteryUpdate,
    config: &MasteryConfig,
) -> SkillMasteryRecord {
    let (mastery, confidence) =
        update_estimate(record.mastery, record.confidence, update.score, update.weight, config);
    SkillMasteryRecord {
        mastery,
        confidence,
        attempts: record.attempts.saturating_add(1),
        updated_at: Utc::now(),
        ..record.clone()
    }
}

/// Turns a grade's skill scores into updates weighted by the grade's
/// confidence, or the configured default when the grader gave none.
pub fn derive_updates(grade: &GradeResult, config: &MasteryConfig) -> Vec<MasteryUpdate> {
    let weight = grade.confidence.unwrap_or(config.default_evidence_weight);
    grade
        .skill_scores
        .iter()
        .flatten()
        .map(|(skill_key, score)| MasteryUpdate {
            skill_key: skill_key.clone(),
            score: *score,
            weight,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    pub dimension: DimensionKey,
    pub label: &'static str,
    pub rank: u32,
    pub score: f64,
    pub confidence: f64,
    pub assessed_count: usize,
    pub total_skills: usize,
}

/// Importance-weighted means per dimension over skills with at least one
/// attempt, in display-rank order. Unassessed dimensions report zeros.
pub fn aggregate_dimensions(records: &[SkillMasteryRecord]) -> Vec<DimensionScore> {
    let mut dimensions: Vec<DimensionScore> = DimensionKey::ALL
        .iter()
        .map(|&key| {
            let assessed: Vec<(&SkillMasteryRecord, f64)> = records
                .iter()
                .filter(|r| r.attempts > 0)
                .filter_map(|r| {
                    let tag = TAXONOMY.get(&r.skill_key)?;
                    (tag.dimension == key).then_some((r, tag.weight))
                })
                .collect();

            let total_weight: f64 = assessed.iter().map(|(_, w)| w).sum();
            let (score, confidence) = if total_weight > 0.0 {
                (
                    assessed.iter().map(|(r, w)| r.mastery * w).sum::<f64>() / total_weight,
                    assessed.iter().map(|(r, w)| r.confidence * w).sum::<f64>() / total_weight,
                )
            } else {
                (0.0, 0.0)
            };

            DimensionScore {
                dimension: key,
                label: key.label(),
                rank: key.rank(),
                score,
                confidence,
                assessed_count: assessed.len(),
                total_skills: TAXONOMY.skills_in(key).count(),
            }
        })
        .collect();
    dimensions.sort_by_key(|d| d.rank);
    dimensions
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProfileSummary {
    pub skills: Vec<SkillMasteryRecord>,
    pub dimensions: Vec<DimensionScore>,
    pub strongest: Vec<String>,
    pub weakest: Vec<String>,
    pub average_mastery: f64,
}

const HIGHLIGHT_COUNT: usize = 3;

pub fn summarize(mut records: Vec<SkillMasteryRecord>) -> SkillProfileSummary {
    records.sort_by(|a, b| a.skill_key.cmp(&b.skill_key));
    let dimensions = aggregate_dimensions(&records);

    let mut assessed: Vec<&SkillMasteryRecord> = records.iter().filter(|r| r.attempts > 0).collect();
    assessed.sort_by(|a, b| {
        b.mastery
            .total_cmp(&a.mastery)
            .then_with(|| a.skill_key.cmp(&b.skill_key))
    });
    let strongest = assessed.iter().take(HIGHLIGHT_COUNT).map(|r| r.skill_key.clone()).collect();
    let weakest = assessed
        .iter()
        .rev()
        .take(HIGHLIGHT_COUNT)
        .map(|r| r.skill_key.clone())
        .collect();
    let average_mastery = if assessed.is_empty() {
        0.0
    } else {
        assessed.iter().map(|r| r.mastery).sum::<f64>() / assessed.len() as f64
    };

    SkillProfileSummary {
        skills: records,
        dimensions,
        strongest,
        weakest,
        average_mastery,
    }
}
