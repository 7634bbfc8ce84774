use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pointer value stored on a session once it has run past the last gradable step.
pub const SUMMARY_STEP: &str = "summary";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Questionnaire,
    Mcq,
    MicroMcqBurst,
    ShortText,
    Code,
    DesignComparison,
    DesignCritique,
    CodeReview,
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub id: String,
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub skill_keys: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_rules: Option<SkipRule>,
    #[serde(flatten)]
    pub payload: StepPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepPayload {
    Questionnaire(QuestionnaireConfig),
    Mcq(McqConfig),
    MicroMcqBurst(BurstConfig),
    ShortText(TextPromptConfig),
    Code(CodeConfig),
    DesignComparison(DesignComparisonConfig),
    DesignCritique(TextPromptConfig),
    CodeReview(TextPromptConfig),
    Summary,
}

impl StepPayload {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Questionnaire(_) => StepKind::Questionnaire,
            Self::Mcq(_) => StepKind::Mcq,
            Self::MicroMcqBurst(_) => StepKind::MicroMcqBurst,
            Self::ShortText(_) => StepKind::ShortText,
            Self::Code(_) => StepKind::Code,
            Self::DesignComparison(_) => StepKind::DesignComparison,
            Self::DesignCritique(_) => StepKind::DesignCritique,
            Self::CodeReview(_) => StepKind::CodeReview,
            Self::Summary => StepKind::Summary,
        }
    }
}

impl StepConfig {
    pub fn kind(&self) -> StepKind {
        self.payload.kind()
    }

    /// Copy of the step that is safe to hand to a learner: answer keys, hidden
    /// tests and rubric text are stripped.
    pub fn redacted(&self) -> StepConfig {
        let mut step = self.clone();
        match &mut step.payload {
            StepPayload::Mcq(cfg) => {
                cfg.explanation = None;
                cfg.options.iter_mut().for_each(|o| o.is_correct = false);
            }
            StepPayload::MicroMcqBurst(cfg) => {
                for q in &mut cfg.questions {
                    q.options.iter_mut().for_each(|o| o.is_correct = false);
                }
            }
            StepPayload::ShortText(cfg)
            | StepPayload::DesignCritique(cfg)
            | StepPayload::CodeReview(cfg) => {
                cfg.rubric.clear();
                cfg.keywords.clear();
            }
            StepPayload::Code(cfg) => cfg.test_cases.retain(|t| !t.hidden),
            StepPayload::DesignComparison(cfg) => {
                cfg.correct_option.clear();
                cfg.explanation = None;
            }
            StepPayload::Questionnaire(_) | StepPayload::Summary => {}
        }
        step
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipCondition {
    Correct,
    ScoreGt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkipRule {
    pub depends_on_step_id: String,
    pub condition: SkipCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

// ---------------------------------------------------------------------------
// Kind-specific payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireConfig {
    pub fields: Vec<QuestionnaireField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireField {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub input: FieldInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_mapping: Option<String>,
    /// Maps a categorical answer onto the 1-5 self-report scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_to_confidence: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_target: Option<ProfileTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldInput {
    Slider {
        min: f64,
        max: f64,
    },
    Select {
        options: Vec<String>,
    },
    MultiSelect {
        options: Vec<String>,
    },
    #[default]
    Text,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProfileTarget {
    Interests,
    ShortTermGoal,
    MediumTermGoal,
    LongTermGoal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqConfig {
    pub question: String,
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub difficulty: SkillLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<ChoiceOption>,
}

/// Minimum correct-answer counts for each detected level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelMapping {
    pub beginner: u32,
    pub intermediate: u32,
    pub advanced: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstConfig {
    pub questions: Vec<BurstQuestion>,
    pub level_mapping: LevelMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u32>,
}

/// Shared by SHORT_TEXT, DESIGN_CRITIQUE and CODE_REVIEW steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPromptConfig {
    pub prompt: String,
    /// Code snippet or design description the prompt refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rubric: String,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_threshold: Option<usize>,
}

fn default_max_score() -> f64 {
    10.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeConfig {
    pub prompt: String,
    pub language: String,
    #[serde(default)]
    pub starter_code: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignComparisonConfig {
    pub prompt: String,
    pub options: Vec<DesignOption>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub correct_option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

// ---------------------------------------------------------------------------
// Answer shapes
// ---------------------------------------------------------------------------

/// Field id to raw value (number, string or list of strings).
pub type QuestionnaireAnswer = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqAnswer {
    #[serde(default)]
    pub selected_option_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstAnswer {
    /// Sub-question id to selected option id.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnswer {
    #[serde(default, alias = "response", alias = "comments")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAnswer {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignComparisonAnswer {
    #[serde(default)]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

// ---------------------------------------------------------------------------
// Grade result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GradedBy {
    SelfReport,
    AnswerKey,
    Ai,
    Heuristic,
    Sandbox,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_level: Option<SkillLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_results: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_by: Option<GradedBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_bonus: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub score: f64,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<GradeDetails>,
}

impl GradeResult {
    /// A failed grade that carries no skill evidence.
    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            passed: false,
            skill_scores: None,
            confidence: None,
            feedback: Some(feedback.into()),
            details: None,
        }
    }

    pub fn not_graded() -> Self {
        Self {
            score: 1.0,
            passed: true,
            skill_scores: None,
            confidence: None,
            feedback: None,
            details: None,
        }
    }

    /// Same score for every listed skill.
    pub fn uniform_skill_scores(skill_keys: &[String], score: f64) -> BTreeMap<String, f64> {
        skill_keys.iter().map(|k| (k.clone(), score)).collect()
    }

    pub fn correct_count(&self) -> Option<u32> {
        self.details.as_ref().and_then(|d| d.correct_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_config_round_trips_kind_tag() {
        let raw = serde_json::json!({
            "id": "js_basics",
            "order": 3,
            "title": "JavaScript basics",
            "skillKeys": ["javascript.syntax"],
            "estimatedMinutes": 1,
            "kind": "MCQ",
            "question": "typeof null?",
            "options": [
                {"id": "a", "text": "null"},
                {"id": "b", "text": "object", "isCorrect": true}
            ],
            "difficulty": "beginner",
            "skipRules": {"dependsOnStepId": "burst", "condition": "SCORE_GT", "value": 3}
        });
        let step: StepConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(step.kind(), StepKind::Mcq);
        let rule = step.skip_rules.as_ref().unwrap();
        assert_eq!(rule.condition, SkipCondition::ScoreGt);
        assert_eq!(rule.value, Some(3.0));

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["kind"], "MCQ");
    }

    #[test]
    fn summary_step_has_no_payload_fields() {
        let raw = serde_json::json!({
            "id": "results", "order": 99, "title": "Done", "kind": "SUMMARY"
        });
        let step: StepConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(step.kind(), StepKind::Summary);
        assert!(step.skill_keys.is_empty());
    }

    #[test]
    fn redacted_mcq_hides_answer_key() {
        let raw = serde_json::json!({
            "id": "q", "order": 1, "title": "Q", "kind": "MCQ",
            "question": "?",
            "options": [{"id": "a", "text": "A", "isCorrect": true}],
            "explanation": "because"
        });
        let step: StepConfig = serde_json::from_value(raw).unwrap();
        let json = serde_json::to_value(step.redacted()).unwrap();
        assert!(json["options"][0].get("isCorrect").is_none());
        assert!(json.get("explanation").is_none());
    }

    #[test]
    fn text_answer_accepts_aliases() {
        let a: TextAnswer = serde_json::from_value(serde_json::json!({"comments": "looks fine"})).unwrap();
        assert_eq!(a.text, "looks fine");
    }
}
