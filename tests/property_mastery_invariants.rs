use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::{json, Value};

use assessment_backend::assessment::config::{GradingConfig, MasteryConfig, RecommendationConfig};
use assessment_backend::assessment::grader::StepGrader;
use assessment_backend::assessment::mastery::update_estimate;
use assessment_backend::assessment::profile::{Goals, StudentProfile};
use assessment_backend::assessment::skip_rules::should_skip;
use assessment_backend::assessment::types::{GradeResult, SkipCondition, SkipRule};
use assessment_backend::assessment::{RecommendationEngine, StepCatalog};

fn arb_answer() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1e6_f64..1e6).prop_map(Value::from),
        "[a-z ]{0,40}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![
                    Just("selectedOptionId".to_string()),
                    Just("selectedOption".to_string()),
                    Just("answers".to_string()),
                    Just("text".to_string()),
                    Just("code".to_string()),
                    Just("interests".to_string()),
                    Just("programming_experience".to_string()),
                    "[a-z_]{1,12}",
                ],
                inner,
                0..5,
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_profile() -> impl Strategy<Value = StudentProfile> {
    let skills = prop::sample::select(vec![
        "javascript.syntax",
        "javascript.async",
        "web.html",
        "web.http",
        "fundamentals.functions",
        "design.ui_principles",
        "practices.git",
    ]);
    (
        prop::collection::vec(
            prop::sample::select(vec!["games", "web-apps", "data", "ai", "design"]),
            0..4,
        ),
        prop::collection::btree_map(skills, 0.0_f64..=1.0, 0..6),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(interests, scores, short, long)| StudentProfile {
            interests: interests.into_iter().map(str::to_string).collect(),
            assessment_scores: scores
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            goals: Goals {
                short_term: if short { "ship something".to_string() } else { String::new() },
                medium_term: String::new(),
                long_term: if long { "get hired".to_string() } else { String::new() },
            },
        })
}

fn unit(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

proptest! {
    #[test]
    fn pt_mastery_and_confidence_stay_in_unit_range(
        mastery in -0.5_f64..1.5,
        confidence in -0.5_f64..1.5,
        score in -1.0_f64..2.0,
        weight in -1.0_f64..2.0,
    ) {
        let cfg = MasteryConfig::default();
        let (m, c) = update_estimate(mastery, confidence, score, weight, &cfg);
        prop_assert!(unit(m));
        prop_assert!(unit(c));
    }

    #[test]
    fn pt_confidence_never_decreases(
        scores in prop::collection::vec((0.0_f64..=1.0, 0.0_f64..=1.0), 1..40),
    ) {
        let cfg = MasteryConfig::default();
        let (mut m, mut c) = (cfg.prior_mastery, 0.0);
        for (score, weight) in scores {
            let (next_m, next_c) = update_estimate(m, c, score, weight, &cfg);
            prop_assert!(next_c >= c);
            prop_assert!(unit(next_m));
            m = next_m;
            c = next_c;
        }
    }

    #[test]
    fn pt_mastery_moves_toward_score(
        mastery in 0.0_f64..=1.0,
        confidence in 0.0_f64..=1.0,
        score in 0.0_f64..=1.0,
        weight in 0.0_f64..=1.0,
    ) {
        let cfg = MasteryConfig::default();
        let (m, _) = update_estimate(mastery, confidence, score, weight, &cfg);
        prop_assert!((score - m).abs() <= (score - mastery).abs() + 1e-12);
    }

    #[test]
    fn pt_every_builtin_step_grades_any_answer(answer in arb_answer()) {
        let catalog = StepCatalog::builtin().unwrap();
        let grader = StepGrader::new(GradingConfig::default(), None, None);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        for step in catalog.steps() {
            let grade = runtime.block_on(grader.grade(step, &answer));
            prop_assert!(unit(grade.score), "{} scored {}", step.id, grade.score);
            if let Some(c) = grade.confidence {
                prop_assert!(unit(c));
            }
            for value in grade.skill_scores.iter().flat_map(|s| s.values()) {
                prop_assert!(unit(*value));
            }
        }
    }

    #[test]
    fn pt_skip_rules_ignore_missing_dependency(value in prop::option::of(-5.0_f64..5.0), correct in any::<bool>()) {
        let rule = SkipRule {
            depends_on_step_id: "dep".to_string(),
            condition: if correct { SkipCondition::Correct } else { SkipCondition::ScoreGt },
            value,
        };
        prop_assert!(!should_skip(&rule, None));

        let failed = GradeResult::rejected("nothing");
        if correct {
            prop_assert!(!should_skip(&rule, Some(&failed)));
        }
    }

    #[test]
    fn pt_recommendations_are_deterministic_and_bounded(
        profile in arb_profile(),
        count in 1_usize..10,
    ) {
        let engine = RecommendationEngine::builtin(RecommendationConfig::default());
        let first = engine.generate(&profile, Some(count), None).unwrap();
        let second = engine.generate(&profile, Some(count), None).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert!(first.len() <= count);
        prop_assert!(first.len() >= count.min(3));
        prop_assert!(first
            .windows(2)
            .all(|w| w[0].template.difficulty <= w[1].template.difficulty));

        let mut ids: Vec<&str> = first.iter().map(|r| r.template.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), first.len());
    }
}
