use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryConfig {
    /// Prior for a skill that has never been assessed.
    pub prior_mastery: f64,
    pub base_learning_rate: f64,
    /// How strongly existing confidence damps the learning rate.
    pub confidence_damping: f64,
    pub confidence_gain: f64,
    /// Update weight used when a grade carries no confidence.
    pub default_evidence_weight: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            prior_mastery: 0.5,
            base_learning_rate: 0.3,
            confidence_damping: 0.7,
            confidence_gain: 0.15,
            default_evidence_weight: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqConfidence {
    pub beginner: f64,
    pub intermediate: f64,
    pub advanced: f64,
}

impl Default for McqConfidence {
    fn default() -> Self {
        Self {
            beginner: 0.6,
            intermediate: 0.75,
            advanced: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicConfig {
    pub base_score: f64,
    pub length_bonus: f64,
    pub keyword_bonus: f64,
    /// Word count that earns the length bonus.
    pub word_threshold: usize,
    /// Answers shorter than this are rejected before grading.
    pub min_chars: usize,
    pub too_short_score: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            base_score: 0.3,
            length_bonus: 0.2,
            keyword_bonus: 0.1,
            word_threshold: 40,
            min_chars: 20,
            too_short_score: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingConfig {
    pub questionnaire_confidence: f64,
    pub mcq_confidence: McqConfidence,
    pub burst_confidence: f64,
    pub ai_text_confidence: f64,
    pub ai_code_review_confidence: f64,
    pub heuristic_confidence: f64,
    pub code_confidence: f64,
    pub design_comparison_confidence: f64,
    pub pass_threshold: f64,
    pub quality_bonus_factor: f64,
    /// Extra attempts against a collaborator before falling back.
    pub collaborator_retries: u32,
    #[serde(default)]
    pub heuristic: HeuristicConfig,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            questionnaire_confidence: 0.2,
            mcq_confidence: McqConfidence::default(),
            burst_confidence: 0.8,
            ai_text_confidence: 0.7,
            ai_code_review_confidence: 0.4,
            heuristic_confidence: 0.3,
            code_confidence: 0.9,
            design_comparison_confidence: 0.7,
            pass_threshold: 0.5,
            quality_bonus_factor: 0.1,
            collaborator_retries: 1,
            heuristic: HeuristicConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationWeights {
    pub interest: f64,
    pub skill_gap: f64,
    pub goal: f64,
    pub difficulty: f64,
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            interest: 0.30,
            skill_gap: 0.40,
            goal: 0.20,
            difficulty: 0.10,
        }
    }
}

impl RecommendationWeights {
    pub fn validate(&self) -> Result<(), String> {
        let parts = [self.interest, self.skill_gap, self.goal, self.difficulty];
        if parts.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err("recommendation weights must each be in [0,1]".to_string());
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("recommendation weights must sum to 1, got {sum}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationConfig {
    pub default_count: usize,
    pub weights: RecommendationWeights,
    /// Skills below this mastery are treated as gaps.
    pub gap_threshold: f64,
    /// Selections taken by score alone before diversity filtering starts.
    pub guaranteed_top: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_count: 5,
            weights: RecommendationWeights::default(),
            gap_threshold: 0.6,
            guaranteed_top: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub mastery: MasteryConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

fn unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl EngineConfig {
    pub fn from_env(env_config: &crate::config::AssessmentEnvConfig) -> Self {
        let mut config = Self::default();
        config.recommendation.default_count = env_config.recommendation_count;
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        let m = &self.mastery;
        if !unit(m.prior_mastery) {
            return Err("mastery.prior_mastery must be in [0,1]".to_string());
        }
        if !unit(m.base_learning_rate) || m.base_learning_rate == 0.0 {
            return Err("mastery.base_learning_rate must be in (0,1]".to_string());
        }
        if !unit(m.confidence_damping) {
            return Err("mastery.confidence_damping must be in [0,1]".to_string());
        }
        if !unit(m.confidence_gain) {
            return Err("mastery.confidence_gain must be in [0,1]".to_string());
        }
        if !unit(m.default_evidence_weight) {
            return Err("mastery.default_evidence_weight must be in [0,1]".to_string());
        }

        let g = &self.grading;
        let confidences = [
            ("questionnaire_confidence", g.questionnaire_confidence),
            ("mcq_confidence.beginner", g.mcq_confidence.beginner),
            ("mcq_confidence.intermediate", g.mcq_confidence.intermediate),
            ("mcq_confidence.advanced", g.mcq_confidence.advanced),
            ("burst_confidence", g.burst_confidence),
            ("ai_text_confidence", g.ai_text_confidence),
            ("ai_code_review_confidence", g.ai_code_review_confidence),
            ("heuristic_confidence", g.heuristic_confidence),
            ("code_confidence", g.code_confidence),
            ("design_comparison_confidence", g.design_comparison_confidence),
            ("pass_threshold", g.pass_threshold),
            ("quality_bonus_factor", g.quality_bonus_factor),
        ];
        if let Some((name, _)) = confidences.iter().find(|(_, v)| !unit(*v)) {
            return Err(format!("grading.{name} must be in [0,1]"));
        }
        if g.heuristic_confidence >= g.ai_text_confidence {
            return Err("grading.heuristic_confidence must stay below ai_text_confidence".to_string());
        }
        let h = &g.heuristic;
        if !unit(h.base_score) || !unit(h.length_bonus) || !unit(h.keyword_bonus) || !unit(h.too_short_score) {
            return Err("grading.heuristic scores must be in [0,1]".to_string());
        }

        let r = &self.recommendation;
        if r.default_count == 0 {
            return Err("recommendation.default_count must be > 0".to_string());
        }
        if !unit(r.gap_threshold) {
            return Err("recommendation.gap_threshold must be in [0,1]".to_string());
        }
        r.weights.validate()?;
        Ok(())
    }
}
