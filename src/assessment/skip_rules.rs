use crate::assessment::types::{GradeResult, SkipCondition, SkipRule};

/// Whether a step guarded by `rule` should be bypassed, given the stored grade
/// of the step it depends on. A missing dependency grade never fires.
///
/// `SCORE_GT` compares with `>=` against the normalised score and, for grades
/// that carry one, against the raw correct-answer count as well.
pub fn should_skip(rule: &SkipRule, dependency: Option<&GradeResult>) -> bool {
    let Some(grade) = dependency else {
        return false;
    };
    match rule.condition {
        SkipCondition::Correct => grade.passed,
        SkipCondition::ScoreGt => {
            let Some(threshold) = rule.value.filter(|v| v.is_finite()) else {
                return false;
            };
            grade.score >= threshold
                || grade
                    .correct_count()
                    .is_some_and(|count| f64::from(count) >= threshold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::types::GradeDetails;

    fn rule(condition: SkipCondition, value: Option<f64>) -> SkipRule {
        SkipRule {
            depends_on_step_id: "dep".to_string(),
            condition,
            value,
        }
    }

    fn grade(score: f64, passed: bool, correct_count: Option<u32>) -> GradeResult {
        GradeResult {
            score,
            passed,
            skill_scores: None,
            confidence: None,
            feedback: None,
            details: Some(GradeDetails {
                correct_count,
                ..GradeDetails::default()
            }),
        }
    }

    #[test]
    fn absent_dependency_never_fires() {
        assert!(!should_skip(&rule(SkipCondition::Correct, None), None));
        assert!(!should_skip(&rule(SkipCondition::ScoreGt, Some(0.0)), None));
    }

    #[test]
    fn correct_follows_passed() {
        let r = rule(SkipCondition::Correct, None);
        assert!(should_skip(&r, Some(&grade(0.2, true, None))));
        assert!(!should_skip(&r, Some(&grade(1.0, false, None))));
    }

    #[test]
    fn score_gt_is_inclusive() {
        let r = rule(SkipCondition::ScoreGt, Some(0.8));
        assert!(should_skip(&r, Some(&grade(0.8, false, None))));
        assert!(!should_skip(&r, Some(&grade(0.79, true, None))));
    }

    #[test]
    fn score_gt_falls_back_to_correct_count() {
        let r = rule(SkipCondition::ScoreGt, Some(3.0));
        assert!(should_skip(&r, Some(&grade(1.0, true, Some(3)))));
        assert!(!should_skip(&r, Some(&grade(0.66, true, Some(2)))));
        assert!(!should_skip(&r, Some(&grade(0.9, true, None))));
    }

    #[test]
    fn score_gt_without_value_never_fires() {
        assert!(!should_skip(&rule(SkipCondition::ScoreGt, None), Some(&grade(1.0, true, Some(9)))));
    }
}
