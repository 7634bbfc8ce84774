pub mod templates;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use templates::{builtin_templates, GoalHorizon, ProjectTemplate};

use crate::assessment::config::{RecommendationConfig, RecommendationWeights};
use crate::assessment::error::RecommendationError;
use crate::assessment::profile::StudentProfile;
use crate::assessment::taxonomy::TAXONOMY;

const INTEREST_NEUTRAL: f64 = 0.5;
const GAP_NEUTRAL: f64 = 0.5;
const GOAL_MATCH: f64 = 0.7;
const GOAL_MISS: f64 = 0.3;
const DIFFICULTY_SPAN: f64 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillGap {
    pub skill_key: String,
    pub mastery: f64,
    pub priority: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub interest: f64,
    pub skill_gap: f64,
    pub goal: f64,
    pub difficulty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecommendation {
    pub template: ProjectTemplate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub matched_interests: Vec<String>,
    pub addressed_gaps: Vec<String>,
    pub reason: String,
}

/// Skills below `threshold`, highest priority (lowest mastery) first.
pub fn skill_gaps(profile: &StudentProfile, threshold: f64) -> Vec<SkillGap> {
    let mut gaps: Vec<SkillGap> = profile
        .assessment_scores
        .iter()
        .filter(|(_, m)| m.is_finite() && **m < threshold)
        .map(|(skill_key, mastery)| SkillGap {
            skill_key: skill_key.clone(),
            mastery: *mastery,
            priority: 1.0 - mastery,
        })
        .collect();
    gaps.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.skill_key.cmp(&b.skill_key))
    });
    gaps
}

/// Maps average mastery onto the 1-5 difficulty scale. No evidence means a
/// beginner target.
pub fn ideal_difficulty(profile: &StudentProfile) -> f64 {
    let scores: Vec<f64> = profile
        .assessment_scores
        .values()
        .copied()
        .filter(|m| m.is_finite())
        .collect();
    let average = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    1.0 + average.clamp(0.0, 1.0) * DIFFICULTY_SPAN
}

fn goal_text<'a>(profile: &'a StudentProfile, horizon: GoalHorizon) -> &'a str {
    match horizon {
        GoalHorizon::Short => &profile.goals.short_term,
        GoalHorizon::Medium => &profile.goals.medium_term,
        GoalHorizon::Long => &profile.goals.long_term,
    }
}

struct Scored<'a> {
    template: &'a ProjectTemplate,
    score: f64,
    breakdown: ScoreBreakdown,
    matched_interests: Vec<String>,
    addressed_gaps: Vec<String>,
}

pub struct RecommendationEngine {
    config: RecommendationConfig,
    templates: Vec<ProjectTemplate>,
}

impl RecommendationEngine {
    pub fn new(config: RecommendationConfig, templates: Vec<ProjectTemplate>) -> Self {
        Self { config, templates }
    }

    pub fn builtin(config: RecommendationConfig) -> Self {
        Self::new(config, builtin_templates())
    }

    pub fn templates(&self) -> &[ProjectTemplate] {
        &self.templates
    }

    fn score_all(&self, profile: &StudentProfile, weights: &RecommendationWeights) -> Vec<Scored<'_>> {
        let gaps = skill_gaps(profile, self.config.gap_threshold);
        let total_priority: f64 = gaps.iter().map(|g| g.priority).sum();
        let ideal = ideal_difficulty(profile);
        let interests: Vec<String> = profile.interests.iter().map(|i| i.trim().to_lowercase()).collect();

        let mut scored: Vec<Scored<'_>> = self
            .templates
            .iter()
            .map(|template| {
                let matched_interests: Vec<String> = template
                    .related_interests
                    .iter()
                    .filter(|i| interests.contains(&i.to_lowercase()))
                    .cloned()
                    .collect();
                let interest = if interests.is_empty() {
                    INTEREST_NEUTRAL
                } else {
                    matched_interests.len() as f64 / interests.len() as f64
                };

                let covered: Vec<&SkillGap> = gaps
                    .iter()
                    .filter(|g| template.skills_covered.contains(&g.skill_key))
                    .collect();
                let skill_gap = if gaps.is_empty() || total_priority <= 0.0 {
                    GAP_NEUTRAL
                } else {
                    covered.iter().map(|g| g.priority).sum::<f64>() / total_priority
                };

                let goal = if goal_text(profile, template.goal_horizon).trim().is_empty() {
                    GOAL_MISS
                } else {
                    GOAL_MATCH
                };

                let distance = (f64::from(template.difficulty) - ideal).abs();
                let difficulty = (1.0 - distance / DIFFICULTY_SPAN).clamp(0.0, 1.0);

                let breakdown = ScoreBreakdown {
                    interest,
                    skill_gap,
                    goal,
                    difficulty,
                };
                let score = weights.interest * interest
                    + weights.skill_gap * skill_gap
                    + weights.goal * goal
                    + weights.difficulty * difficulty;

                Scored {
                    template,
                    score,
                    breakdown,
                    matched_interests,
                    addressed_gaps: covered.iter().map(|g| g.skill_key.clone()).collect(),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.template.id.cmp(&b.template.id))
        });
        scored
    }

    /// Every template with its score, best first.
    pub fn rank(
        &self,
        profile: &StudentProfile,
        weights: Option<RecommendationWeights>,
    ) -> Result<Vec<(String, f64)>, RecommendationError> {
        let weights = self.resolve_weights(weights)?;
        Ok(self
            .score_all(profile, &weights)
            .into_iter()
            .map(|s| (s.template.id.clone(), s.score))
            .collect())
    }

    fn resolve_weights(
        &self,
        weights: Option<RecommendationWeights>,
    ) -> Result<RecommendationWeights, RecommendationError> {
        let weights = weights.unwrap_or(self.config.weights);
        weights.validate().map_err(RecommendationError::InvalidWeights)?;
        Ok(weights)
    }

    /// Scores every template, keeps the top few outright, then only admits
    /// templates that add a new goal horizon, interest or category. The result
    /// is ordered easiest first.
    pub fn generate(
        &self,
        profile: &StudentProfile,
        count: Option<usize>,
        weights: Option<RecommendationWeights>,
    ) -> Result<Vec<ProjectRecommendation>, RecommendationError> {
        let weights = self.resolve_weights(weights)?;
        let count = count.unwrap_or(self.config.default_count);
        let ideal = ideal_difficulty(profile);

        let mut horizons = HashSet::new();
        let mut interests: HashSet<String> = HashSet::new();
        let mut categories: HashSet<String> = HashSet::new();
        let mut selected: Vec<Scored<'_>> = Vec::new();

        for candidate in self.score_all(profile, &weights) {
            if selected.len() >= count {
                break;
            }
            let t = candidate.template;
            let adds_variety = !horizons.contains(&t.goal_horizon)
                || !categories.contains(&t.category)
                || t.related_interests.iter().any(|i| !interests.contains(i));
            if selected.len() >= self.config.guaranteed_top && !adds_variety {
                continue;
            }
            horizons.insert(t.goal_horizon);
            categories.insert(t.category.clone());
            interests.extend(t.related_interests.iter().cloned());
            selected.push(candidate);
        }

        selected.sort_by_key(|s| s.template.difficulty);

        Ok(selected
            .into_iter()
            .map(|s| {
                let reason = build_reason(&s, profile, ideal);
                ProjectRecommendation {
                    template: s.template.clone(),
                    score: s.score,
                    breakdown: s.breakdown,
                    matched_interests: s.matched_interests,
                    addressed_gaps: s.addressed_gaps,
                    reason,
                }
            })
            .collect())
    }
}

fn skill_label(key: &str) -> String {
    TAXONOMY
        .get(key)
        .map(|s| s.label.to_string())
        .unwrap_or_else(|| key.to_string())
}

fn build_reason(s: &Scored<'_>, profile: &StudentProfile, ideal: f64) -> String {
    let mut parts = Vec::new();

    if !s.matched_interests.is_empty() {
        parts.push(format!("Matches your interest in {}.", s.matched_interests.join(" and ")));
    }

    // addressed_gaps keeps the gap priority order
    let top_gaps: Vec<String> = s.addressed_gaps.iter().take(2).map(|k| skill_label(k)).collect();
    if !top_gaps.is_empty() {
        parts.push(format!("Strengthens {}.", top_gaps.join(" and ")));
    }

    if !goal_text(profile, s.template.goal_horizon).trim().is_empty() {
        parts.push(format!("Supports your {} goal.", s.template.goal_horizon.label()));
    }

    let difficulty = f64::from(s.template.difficulty);
    parts.push(
        if difficulty > ideal + 0.5 {
            "A stretch just above your current level."
        } else if difficulty < ideal - 0.5 {
            "A comfortable project to build confidence."
        } else {
            "Right at your current level."
        }
        .to_string(),
    );

    parts.join(" ")
}
