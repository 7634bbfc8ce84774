use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::assessment::error::CatalogError;
use crate::assessment::taxonomy::TAXONOMY;
use crate::assessment::types::*;

/// Ordered, validated list of assessment steps. Immutable once built.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepConfig>,
    index: HashMap<String, usize>,
}

impl StepCatalog {
    pub fn new(mut steps: Vec<StepConfig>) -> Result<Self, CatalogError> {
        if steps.is_empty() {
            return Err(CatalogError::Empty);
        }
        steps.sort_by_key(|s| s.order);

        let mut index = HashMap::with_capacity(steps.len());
        let mut orders = HashSet::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if step.id == SUMMARY_STEP {
                return Err(CatalogError::ReservedId(step.id.clone()));
            }
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateId(step.id.clone()));
            }
            if !orders.insert(step.order) {
                return Err(CatalogError::DuplicateOrder {
                    step_id: step.id.clone(),
                    order: step.order,
                });
            }
        }

        for (pos, step) in steps.iter().enumerate() {
            validate_skills(step)?;
            validate_payload(step)?;
            if let Some(rule) = &step.skip_rules {
                let dep_pos = index.get(&rule.depends_on_step_id).copied();
                if dep_pos.map_or(true, |d| d >= pos) {
                    return Err(CatalogError::InvalidSkipDependency {
                        step_id: step.id.clone(),
                        depends_on: rule.depends_on_step_id.clone(),
                    });
                }
                if rule.condition == SkipCondition::ScoreGt && rule.value.is_none() {
                    return Err(CatalogError::MissingSkipValue {
                        step_id: step.id.clone(),
                    });
                }
            }
        }

        Ok(Self { steps, index })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::Load(format!("{}: {e}", path.as_ref().display())))?;
        let steps: Vec<StepConfig> =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Load(e.to_string()))?;
        Self::new(steps)
    }

    pub fn steps(&self) -> &[StepConfig] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> &StepConfig {
        &self.steps[0]
    }

    pub fn get(&self, step_id: &str) -> Option<&StepConfig> {
        self.index.get(step_id).map(|&pos| &self.steps[pos])
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.index.get(step_id).copied()
    }

    pub fn next(&self, step_id: &str) -> Option<&StepConfig> {
        self.position(step_id).and_then(|pos| self.steps.get(pos + 1))
    }

    pub fn previous(&self, step_id: &str) -> Option<&StepConfig> {
        match self.position(step_id) {
            Some(pos) if pos > 0 => self.steps.get(pos - 1),
            _ => None,
        }
    }

    pub fn is_last(&self, step_id: &str) -> bool {
        self.position(step_id) == Some(self.steps.len() - 1)
    }

    /// Estimated minutes for the given step and everything after it.
    pub fn remaining_minutes_from(&self, step_id: &str) -> u32 {
        match self.position(step_id) {
            Some(pos) => self.steps[pos..].iter().map(|s| s.estimated_minutes).sum(),
            None => 0,
        }
    }

    /// The built-in onboarding assessment.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(builtin_steps())
    }
}

fn validate_skills(step: &StepConfig) -> Result<(), CatalogError> {
    let mapped = match &step.payload {
        StepPayload::Questionnaire(cfg) => cfg
            .fields
            .iter()
            .filter_map(|f| f.skill_mapping.as_deref())
            .collect::<Vec<_>>(),
        _ => Vec::new(),
    };
    for key in step.skill_keys.iter().map(String::as_str).chain(mapped) {
        if !TAXONOMY.contains(key) {
            return Err(CatalogError::UnknownSkill {
                step_id: step.id.clone(),
                skill_key: key.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_payload(step: &StepConfig) -> Result<(), CatalogError> {
    let invalid = |message: &str| CatalogError::InvalidPayload {
        step_id: step.id.clone(),
        message: message.to_string(),
    };
    match &step.payload {
        StepPayload::Mcq(cfg) => {
            if cfg.options.iter().filter(|o| o.is_correct).count() != 1 {
                return Err(invalid("MCQ needs exactly one correct option"));
            }
        }
        StepPayload::MicroMcqBurst(cfg) => {
            if cfg.questions.is_empty() {
                return Err(invalid("burst needs at least one question"));
            }
            let m = cfg.level_mapping;
            if !(m.beginner <= m.intermediate && m.intermediate <= m.advanced) {
                return Err(invalid("level mapping thresholds must be ascending"));
            }
        }
        StepPayload::ShortText(cfg) | StepPayload::DesignCritique(cfg) | StepPayload::CodeReview(cfg) => {
            if cfg.max_score <= 0.0 {
                return Err(invalid("maxScore must be > 0"));
            }
        }
        StepPayload::Code(cfg) => {
            if cfg.test_cases.is_empty() {
                return Err(invalid("code step needs test cases"));
            }
        }
        StepPayload::DesignComparison(cfg) => {
            if !cfg.options.iter().any(|o| o.id == cfg.correct_option) {
                return Err(invalid("correctOption must name one of the options"));
            }
        }
        StepPayload::Questionnaire(_) | StepPayload::Summary => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Built-in onboarding catalog
// ---------------------------------------------------------------------------

fn keys(skills: &[&str]) -> Vec<String> {
    skills.iter().map(|s| s.to_string()).collect()
}

fn opt(id: &str, text: &str, is_correct: bool) -> ChoiceOption {
    ChoiceOption {
        id: id.to_string(),
        text: text.to_string(),
        is_correct,
    }
}

fn step(id: &str, order: u32, title: &str, skills: &[&str], minutes: u32, payload: StepPayload) -> StepConfig {
    StepConfig {
        id: id.to_string(),
        order,
        title: title.to_string(),
        skill_keys: keys(skills),
        estimated_minutes: minutes,
        skip_rules: None,
        payload,
    }
}

fn skip_if(depends_on: &str, condition: SkipCondition, value: Option<f64>) -> Option<SkipRule> {
    Some(SkipRule {
        depends_on_step_id: depends_on.to_string(),
        condition,
        value,
    })
}

const COMFORT_SCALE: [(&str, f64); 5] = [
    ("none", 1.0),
    ("basic", 2.0),
    ("comfortable", 3.0),
    ("confident", 4.0),
    ("expert", 5.0),
];

fn slider_field(id: &str, label: &str, skill: &str) -> QuestionnaireField {
    QuestionnaireField {
        id: id.to_string(),
        label: label.to_string(),
        input: FieldInput::Slider { min: 1.0, max: 5.0 },
        skill_mapping: Some(skill.to_string()),
        value_to_confidence: None,
        profile_target: None,
    }
}

fn comfort_field(id: &str, label: &str, skill: &str) -> QuestionnaireField {
    QuestionnaireField {
        id: id.to_string(),
        label: label.to_string(),
        input: FieldInput::Select {
            options: COMFORT_SCALE.iter().map(|(k, _)| k.to_string()).collect(),
        },
        skill_mapping: Some(skill.to_string()),
        value_to_confidence: Some(
            COMFORT_SCALE
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        ),
        profile_target: None,
    }
}

fn profile_field(id: &str, label: &str, input: FieldInput, target: ProfileTarget) -> QuestionnaireField {
    QuestionnaireField {
        id: id.to_string(),
        label: label.to_string(),
        input,
        skill_mapping: None,
        value_to_confidence: None,
        profile_target: Some(target),
    }
}

fn text_prompt(prompt: &str, context: Option<&str>, rubric: &str, keywords: &[&str]) -> TextPromptConfig {
    TextPromptConfig {
        prompt: prompt.to_string(),
        context: context.map(str::to_string),
        rubric: rubric.to_string(),
        max_score: 10.0,
        keywords: keys(keywords),
        min_chars: None,
        word_threshold: None,
    }
}

fn builtin_steps() -> Vec<StepConfig> {
    let interests = [
        "web-apps", "games", "data", "automation", "mobile", "ai", "design", "open-source",
    ];

    let mut steps = vec![
        step(
            "background",
            1,
            "About you",
            &[],
            4,
            StepPayload::Questionnaire(QuestionnaireConfig {
                fields: vec![
                    slider_field("programming_experience", "How comfortable are you writing small programs?", "fundamentals.control_flow"),
                    comfort_field("javascript_comfort", "How comfortable are you with JavaScript?", "javascript.syntax"),
                    comfort_field("git_comfort", "How comfortable are you with Git?", "practices.git"),
                    slider_field("html_css_experience", "How comfortable are you building pages with HTML?", "web.html"),
                    profile_field(
                        "interests",
                        "What would you like to build?",
                        FieldInput::MultiSelect {
                            options: interests.iter().map(|s| s.to_string()).collect(),
                        },
                        ProfileTarget::Interests,
                    ),
                    profile_field("goal_short", "What do you want to achieve in the next month?", FieldInput::Text, ProfileTarget::ShortTermGoal),
                    profile_field("goal_medium", "Where do you want to be in six months?", FieldInput::Text, ProfileTarget::MediumTermGoal),
                    profile_field("goal_long", "What is your long-term goal?", FieldInput::Text, ProfileTarget::LongTermGoal),
                ],
            }),
        ),
        step(
            "js_warmup",
            2,
            "JavaScript warm-up",
            &["javascript.syntax", "fundamentals.variables"],
            3,
            StepPayload::MicroMcqBurst(BurstConfig {
                questions: vec![
                    BurstQuestion {
                        id: "q1".to_string(),
                        question: "What does `typeof []` return?".to_string(),
                        options: vec![opt("a", "\"array\"", false), opt("b", "\"object\"", true), opt("c", "\"list\"", false)],
                    },
                    BurstQuestion {
                        id: "q2".to_string(),
                        question: "Which keyword declares a block-scoped constant?".to_string(),
                        options: vec![opt("a", "var", false), opt("b", "let", false), opt("c", "const", true)],
                    },
                    BurstQuestion {
                        id: "q3".to_string(),
                        question: "What is `0.1 + 0.2 === 0.3`?".to_string(),
                        options: vec![opt("a", "true", false), opt("b", "false", true)],
                    },
                ],
                level_mapping: LevelMapping {
                    beginner: 1,
                    intermediate: 2,
                    advanced: 3,
                },
                time_limit_secs: Some(90),
            }),
        ),
        StepConfig {
            skip_rules: skip_if("js_warmup", SkipCondition::ScoreGt, Some(3.0)),
            ..step(
                "js_basics",
                3,
                "Variables and equality",
                &["javascript.syntax", "fundamentals.variables"],
                2,
                StepPayload::Mcq(McqConfig {
                    question: "What does `'5' == 5` evaluate to?".to_string(),
                    options: vec![opt("a", "true", true), opt("b", "false", false), opt("c", "TypeError", false)],
                    difficulty: SkillLevel::Beginner,
                    explanation: Some("`==` coerces the string before comparing.".to_string()),
                }),
            )
        },
        step(
            "js_closures",
            4,
            "Closures",
            &["javascript.closures", "fundamentals.functions"],
            2,
            StepPayload::Mcq(McqConfig {
                question: "for (var i = 0; i < 3; i++) setTimeout(() => console.log(i)); prints?".to_string(),
                options: vec![opt("a", "0 1 2", false), opt("b", "3 3 3", true), opt("c", "undefined x3", false)],
                difficulty: SkillLevel::Intermediate,
                explanation: Some("`var` is function scoped, so every callback sees the final value.".to_string()),
            }),
        ),
        step(
            "js_async",
            5,
            "Promises",
            &["javascript.async"],
            2,
            StepPayload::Mcq(McqConfig {
                question: "Which runs first: a resolved promise `.then` callback or a `setTimeout(fn, 0)` callback?".to_string(),
                options: vec![opt("a", "The promise callback", true), opt("b", "The timeout callback", false), opt("c", "It is random", false)],
                difficulty: SkillLevel::Advanced,
                explanation: Some("Microtasks drain before the next macrotask.".to_string()),
            }),
        ),
        step(
            "http_basics",
            6,
            "HTTP",
            &["web.http", "backend.rest_api"],
            2,
            StepPayload::Mcq(McqConfig {
                question: "Which status code fits a successful POST that created a resource?".to_string(),
                options: vec![opt("a", "200", false), opt("b", "201", true), opt("c", "204", false), opt("d", "302", false)],
                difficulty: SkillLevel::Beginner,
                explanation: None,
            }),
        ),
        step(
            "explain_state",
            7,
            "Explain a concept",
            &["meta.communication", "javascript.closures"],
            5,
            StepPayload::ShortText(text_prompt(
                "Explain what a closure is to someone who just learned functions.",
                None,
                "Full marks: explains that a function keeps access to variables from the scope where it was defined, gives an example, avoids jargon.",
                &["scope", "function", "variable", "outer", "inner", "remember", "lexical", "example"],
            )),
        ),
        step(
            "code_sum_evens",
            8,
            "Write a function",
            &["fundamentals.functions", "fundamentals.control_flow", "fundamentals.algorithms"],
            10,
            StepPayload::Code(CodeConfig {
                prompt: "Write `sumEvens(numbers)` that returns the sum of the even numbers in the array.".to_string(),
                language: "javascript".to_string(),
                starter_code: "function sumEvens(numbers) {\n  // your code\n}\n".to_string(),
                test_cases: vec![
                    TestCase { input: "[1,2,3,4]".to_string(), expected_output: "6".to_string(), weight: None, hidden: false },
                    TestCase { input: "[]".to_string(), expected_output: "0".to_string(), weight: None, hidden: false },
                    TestCase { input: "[-2,5,8]".to_string(), expected_output: "6".to_string(), weight: Some(2.0), hidden: true },
                ],
            }),
        ),
        StepConfig {
            skip_rules: skip_if("code_sum_evens", SkipCondition::Correct, None),
            ..step(
                "debugging",
                9,
                "Spot the bug",
                &["fundamentals.debugging"],
                2,
                StepPayload::Mcq(McqConfig {
                    question: "`for (let i = 0; i <= arr.length; i++) total += arr[i];` returns NaN. Why?".to_string(),
                    options: vec![
                        opt("a", "`let` should be `var`", false),
                        opt("b", "The loop reads one element past the end", true),
                        opt("c", "`total` must be a string", false),
                    ],
                    difficulty: SkillLevel::Beginner,
                    explanation: None,
                }),
            )
        },
        step(
            "layout_choice",
            10,
            "Compare two layouts",
            &["design.ui_principles", "design.visual_hierarchy"],
            3,
            StepPayload::DesignComparison(DesignComparisonConfig {
                prompt: "Which sign-up form gives the clearest visual hierarchy?".to_string(),
                options: vec![
                    DesignOption { id: "a".to_string(), label: "Form A".to_string(), description: "All labels bold, three equally loud buttons.".to_string() },
                    DesignOption { id: "b".to_string(), label: "Form B".to_string(), description: "One primary button, secondary actions as links, grouped fields.".to_string() },
                ],
                correct_option: "b".to_string(),
                explanation: Some("A single primary action guides the eye.".to_string()),
            }),
        ),
        step(
            "critique_dashboard",
            11,
            "Critique a screen",
            &["design.ux_critique", "systems.tradeoffs"],
            5,
            StepPayload::DesignCritique(text_prompt(
                "What would you change about this dashboard and why?",
                Some("A dashboard with twelve charts of equal size, no headings, red and green as the only status colours."),
                "Full marks: identifies missing hierarchy, colour-blind accessibility, suggests grouping or prioritising, justifies trade-offs.",
                &["hierarchy", "contrast", "accessibility", "colour", "color", "group", "priority", "users", "heading"],
            )),
        ),
        step(
            "review_snippet",
            12,
            "Review some code",
            &["practices.code_review", "practices.code_quality"],
            5,
            StepPayload::CodeReview(text_prompt(
                "Review this function as if it were in a pull request.",
                Some("function get(u){ var r = fetch('/api/users/'+u).then(r=>r.json()); return r }"),
                "Full marks: notes unclear naming, shadowed variable, missing error handling, missing input encoding, suggests async/await.",
                &["naming", "error", "handling", "async", "await", "shadow", "encode", "variable", "readability"],
            )),
        ),
        step("results", 13, "Your results", &[], 1, StepPayload::Summary),
    ];
    steps.sort_by_key(|s| s.order);
    steps
}
