mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;

use assessment_backend::assessment::error::EngineError;
use assessment_backend::assessment::grader::{CodeExecutor, RubricGrader};
use assessment_backend::assessment::profile::{ProfileExtractor, ResponseProfileExtractor};
use assessment_backend::assessment::repository::{AssessmentRepository, SessionStatus};
use assessment_backend::assessment::types::{GradedBy, SkillLevel, SUMMARY_STEP};

use assessment_backend::assessment::StepCatalog;

use common::fixtures::{
    background_answer, burst_answer, closure_explanation, engine_for_catalog, engine_over,
    engine_with, mcq_answer,
    open_store, sum_evens_code, EngineHarness, FixedRubric, FlakyMasteryRepo, OfflineRubric,
    UniformRunner,
};

fn full_collaborators() -> EngineHarness {
    let rubric: Arc<dyn RubricGrader> = Arc::new(FixedRubric {
        ratio: 0.8,
        quality: 1.0,
    });
    let runner: Arc<dyn CodeExecutor> = Arc::new(UniformRunner { pass: true });
    engine_with(Some(rubric), Some(runner))
}

#[tokio::test]
async fn start_twice_resumes_the_same_session() {
    let h = engine_with(None, None);

    let first = h.engine.start("u1", None).await.unwrap();
    assert!(!first.is_resuming);
    assert_eq!(first.session.status, SessionStatus::InProgress);
    assert_eq!(first.session.current_step.as_deref(), Some("background"));
    assert_eq!(first.current_step.as_ref().unwrap().id, "background");

    let second = h.engine.start("u1", None).await.unwrap();
    assert!(second.is_resuming);
    assert_eq!(second.session.id, first.session.id);

    let other_type = h.engine.start("u1", Some("placement")).await.unwrap();
    assert_ne!(other_type.session.id, first.session.id);
}

#[tokio::test]
async fn concurrent_starts_share_one_session() {
    let h = engine_with(None, None);
    let engine = Arc::new(h.engine);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start("racer", None).await.unwrap().session.id })
        })
        .collect();
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn full_walkthrough_applies_skips_and_completes() {
    let mut h = full_collaborators();
    let session = h.engine.start("learner", None).await.unwrap().session;
    let sid = session.id.as_str();

    let out = h
        .engine
        .submit_answer("learner", sid, "background", background_answer(), Some(60))
        .await
        .unwrap();
    assert_eq!(out.next_step.as_ref().unwrap().id, "js_warmup");
    assert_eq!(out.mastery_deltas.len(), 4);

    let out = h
        .engine
        .submit_answer("learner", sid, "js_warmup", burst_answer(3), None)
        .await
        .unwrap();
    let details = out.grade.details.as_ref().unwrap();
    assert_eq!(details.correct_count, Some(3));
    assert_eq!(details.detected_level, Some(SkillLevel::Advanced));
    assert_eq!(out.skipped_step_id.as_deref(), Some("js_basics"));
    assert_eq!(out.next_step.as_ref().unwrap().id, "js_closures");

    for (step, answer) in [
        ("js_closures", mcq_answer("b")),
        ("js_async", mcq_answer("a")),
        ("http_basics", mcq_answer("b")),
    ] {
        let out = h
            .engine
            .submit_answer("learner", sid, step, answer, None)
            .await
            .unwrap();
        assert!(out.grade.passed, "{step} should pass");
        assert!(out.skipped_step_id.is_none());
    }

    let out = h
        .engine
        .submit_answer("learner", sid, "explain_state", closure_explanation(), None)
        .await
        .unwrap();
    assert!((out.grade.score - 0.8).abs() < 1e-9);
    assert_eq!(out.grade.confidence, Some(0.7));

    let out = h
        .engine
        .submit_answer("learner", sid, "code_sum_evens", sum_evens_code(), None)
        .await
        .unwrap();
    assert!(out.grade.passed);
    assert_eq!(out.grade.score, 1.0);
    assert_eq!(out.skipped_step_id.as_deref(), Some("debugging"));
    assert_eq!(out.next_step.as_ref().unwrap().id, "layout_choice");

    h.engine
        .submit_answer("learner", sid, "layout_choice", json!({"selectedOption": "b"}), None)
        .await
        .unwrap();
    h.engine
        .submit_answer(
            "learner",
            sid,
            "critique_dashboard",
            json!({"text": "Add headings and group related charts so the hierarchy is clear."}),
            None,
        )
        .await
        .unwrap();
    let last = h
        .engine
        .submit_answer(
            "learner",
            sid,
            "review_snippet",
            json!({"text": "Rename get and r, add error handling and prefer async/await."}),
            None,
        )
        .await
        .unwrap();

    assert!(last.completed);
    assert!(last.next_step.is_none());
    assert_eq!(last.session.status, SessionStatus::Completed);
    assert_eq!(last.session.current_step.as_deref(), Some(SUMMARY_STEP));
    assert!(last.session.completed_at.is_some());
    assert_eq!(last.grade.confidence, Some(0.4));

    let job = h.jobs.try_recv().expect("profile extraction job queued");
    assert_eq!(job.session_id, session.id);
    assert_eq!(job.user_id, "learner");

    let progress = h.engine.progress("learner", sid).unwrap();
    assert_eq!(progress.answered_steps, 10);
    assert_eq!(progress.step_index, progress.total_steps);
    assert_eq!(progress.percent_complete, 100.0);
    assert!(h.engine.current_step("learner", sid).unwrap().is_none());

    let responses = h.engine.list_responses("learner", sid).unwrap();
    let order: Vec<&str> = responses.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(order.first(), Some(&"background"));
    assert_eq!(order.last(), Some(&"review_snippet"));
    assert!(!order.contains(&"js_basics"));
}

#[tokio::test]
async fn partial_burst_does_not_skip() {
    let h = engine_with(None, None);
    let sid = h.engine.start("u2", None).await.unwrap().session.id;

    h.engine
        .submit_answer("u2", &sid, "background", background_answer(), None)
        .await
        .unwrap();
    let out = h
        .engine
        .submit_answer("u2", &sid, "js_warmup", burst_answer(2), None)
        .await
        .unwrap();

    assert!((out.grade.score - 2.0 / 3.0).abs() < 1e-9);
    assert!(out.grade.passed);
    assert_eq!(
        out.grade.details.as_ref().unwrap().detected_level,
        Some(SkillLevel::Intermediate)
    );
    assert!(out.skipped_step_id.is_none());
    assert_eq!(out.next_step.unwrap().id, "js_basics");
}

#[tokio::test]
async fn completed_session_rejects_submission_unchanged() {
    let h = full_collaborators();
    let sid = h.engine.start("u3", None).await.unwrap().session.id;

    // Answering the last real step completes the session.
    let done = h
        .engine
        .submit_answer("u3", &sid, "review_snippet", json!({"text": "Rename variables and handle errors."}), None)
        .await
        .unwrap();
    assert!(done.completed);
    let before = h.store.get_session(&sid).unwrap().unwrap();

    let err = h
        .engine
        .submit_answer("u3", &sid, "background", background_answer(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionAlreadyCompleted(_)));

    let after = h.store.get_session(&sid).unwrap().unwrap();
    assert_eq!(before, after);
    assert!(h.store.get_response(&sid, "background").unwrap().is_none());
}

#[tokio::test]
async fn finished_session_has_no_current_step_even_after_abandon() {
    let h = full_collaborators();
    let sid = h.engine.start("u3b", None).await.unwrap().session.id;

    h.engine
        .submit_answer("u3b", &sid, "review_snippet", json!({"text": "Handle errors."}), None)
        .await
        .unwrap();
    assert!(h.engine.current_step("u3b", &sid).unwrap().is_none());

    let abandoned = h.engine.abandon("u3b", &sid).await.unwrap();
    assert_eq!(abandoned.current_step.as_deref(), Some(SUMMARY_STEP));
    assert!(h.engine.current_step("u3b", &sid).unwrap().is_none());

    let progress = h.engine.progress("u3b", &sid).unwrap();
    assert_eq!(progress.step_index, progress.total_steps);
    assert_eq!(progress.remaining_minutes, 0);
    assert_eq!(progress.percent_complete, 100.0);
}

fn mcq_json(id: &str, order: u32, skip_on: Option<&str>) -> serde_json::Value {
    let mut step = json!({
        "id": id, "order": order, "title": id, "kind": "MCQ",
        "skillKeys": ["javascript.syntax"],
        "question": "?",
        "options": [
            {"id": "a", "text": "A", "isCorrect": true},
            {"id": "b", "text": "B"}
        ],
        "difficulty": "beginner"
    });
    if let Some(dep) = skip_on {
        step["skipRules"] = json!({"dependsOnStepId": dep, "condition": "CORRECT"});
    }
    step
}

#[tokio::test]
async fn consecutive_skippable_steps_resolve_one_hop() {
    let steps = serde_json::from_value(json!([
        mcq_json("a", 1, None),
        mcq_json("b", 2, Some("a")),
        mcq_json("c", 3, Some("a")),
        {"id": "done", "order": 4, "title": "Done", "kind": "SUMMARY"}
    ]))
    .unwrap();
    let h = engine_for_catalog(StepCatalog::new(steps).unwrap());
    let sid = h.engine.start("chain", None).await.unwrap().session.id;

    let out = h
        .engine
        .submit_answer("chain", &sid, "a", mcq_answer("a"), None)
        .await
        .unwrap();
    assert!(out.grade.passed);
    assert_eq!(out.skipped_step_id.as_deref(), Some("b"));
    // `c` qualifies for skipping too but is not re-evaluated in this submission.
    assert_eq!(out.next_step.unwrap().id, "c");
    assert!(!out.completed);
    assert_eq!(out.session.current_step.as_deref(), Some("c"));
}

#[tokio::test]
async fn unknown_step_and_foreign_session_are_rejected() {
    let h = engine_with(None, None);
    let sid = h.engine.start("owner", None).await.unwrap().session.id;

    let err = h
        .engine
        .submit_answer("owner", &sid, "no_such_step", json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StepNotFound(_)));

    let err = h
        .engine
        .submit_answer("intruder", &sid, "background", background_answer(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));

    let err = h.engine.get_session("owner", "missing").unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn go_to_previous_is_linear_and_stops_at_first_step() {
    let h = engine_with(None, None);
    let sid = h.engine.start("u4", None).await.unwrap().session.id;

    assert!(h.engine.go_to_previous("u4", &sid).await.unwrap().is_none());
    let unchanged = h.engine.get_session("u4", &sid).unwrap();
    assert_eq!(unchanged.session.current_step.as_deref(), Some("background"));

    h.engine
        .submit_answer("u4", &sid, "background", background_answer(), None)
        .await
        .unwrap();
    let out = h
        .engine
        .submit_answer("u4", &sid, "js_warmup", burst_answer(3), None)
        .await
        .unwrap();
    assert_eq!(out.next_step.unwrap().id, "js_closures");

    // Backward navigation does not re-apply the skip.
    let previous = h.engine.go_to_previous("u4", &sid).await.unwrap().unwrap();
    assert_eq!(previous.id, "js_basics");
    let view = h.engine.get_session("u4", &sid).unwrap();
    assert_eq!(view.session.current_step.as_deref(), Some("js_basics"));
    assert_eq!(view.progress.step_index, 3);
    assert_eq!(view.progress.answered_steps, 2);
}

#[tokio::test]
async fn abandon_is_terminal_and_frees_the_slot() {
    let h = engine_with(None, None);
    let sid = h.engine.start("u5", None).await.unwrap().session.id;

    let abandoned = h.engine.abandon("u5", &sid).await.unwrap();
    assert_eq!(abandoned.status, SessionStatus::Abandoned);
    assert!(abandoned.abandoned_at.is_some());

    let err = h
        .engine
        .submit_answer("u5", &sid, "background", background_answer(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionAbandoned(_)));
    let err = h.engine.go_to_previous("u5", &sid).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionAbandoned(_)));

    let fresh = h.engine.start("u5", None).await.unwrap();
    assert!(!fresh.is_resuming);
    assert_ne!(fresh.session.id, sid);

    let sessions = h.engine.list_sessions("u5").unwrap();
    assert_eq!(sessions.len(), 2);
}

#[tokio::test]
async fn one_failing_mastery_write_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let flaky = Arc::new(FlakyMasteryRepo::new(store.clone(), "javascript.syntax"));
    let h = engine_over(store, flaky.clone(), None, None, dir);
    let sid = h.engine.start("u6", None).await.unwrap().session.id;

    let out = h
        .engine
        .submit_answer("u6", &sid, "background", background_answer(), None)
        .await
        .unwrap();

    assert_eq!(flaky.failures.load(Ordering::SeqCst), 1);
    assert_eq!(out.mastery_deltas.len(), 3);
    assert!(out
        .mastery_deltas
        .iter()
        .all(|d| d.skill_key != "javascript.syntax"));
    assert_eq!(out.next_step.unwrap().id, "js_warmup");

    let records = h.store.list_mastery("u6").unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn offline_rubric_falls_back_to_heuristic() {
    let rubric: Arc<dyn RubricGrader> = Arc::new(OfflineRubric);
    let h = engine_with(Some(rubric), None);
    let sid = h.engine.start("u7", None).await.unwrap().session.id;

    let out = h
        .engine
        .submit_answer("u7", &sid, "explain_state", closure_explanation(), None)
        .await
        .unwrap();
    let details = out.grade.details.as_ref().unwrap();
    assert_eq!(details.graded_by, Some(GradedBy::Heuristic));
    assert_eq!(out.grade.confidence, Some(0.3));
    assert!(out.grade.score > 0.0 && out.grade.score <= 1.0);
}

#[tokio::test]
async fn missing_sandbox_grades_code_zero_without_evidence() {
    let h = engine_with(None, None);
    let sid = h.engine.start("u8", None).await.unwrap().session.id;

    let out = h
        .engine
        .submit_answer("u8", &sid, "code_sum_evens", sum_evens_code(), None)
        .await
        .unwrap();
    assert_eq!(out.grade.score, 0.0);
    assert!(!out.grade.passed);
    assert!(out.mastery_deltas.is_empty());
    // Failed code never triggers the CORRECT skip on the next step.
    assert_eq!(out.next_step.unwrap().id, "debugging");
}

#[tokio::test]
async fn resubmission_replaces_the_response() {
    let h = engine_with(None, None);
    let sid = h.engine.start("u9", None).await.unwrap().session.id;

    h.engine
        .submit_answer("u9", &sid, "http_basics", mcq_answer("a"), None)
        .await
        .unwrap();
    h.engine
        .submit_answer("u9", &sid, "http_basics", mcq_answer("b"), None)
        .await
        .unwrap();

    let response = h.store.get_response(&sid, "http_basics").unwrap().unwrap();
    assert_eq!(response.submissions, 2);
    assert!(response.grade.passed);

    let profile = h.engine.skill_profile("u9").unwrap();
    let http = profile
        .skills
        .iter()
        .find(|r| r.skill_key == "web.http")
        .unwrap();
    assert_eq!(http.attempts, 2);
}

#[tokio::test]
async fn extractor_reads_interests_and_goals_from_completed_session() {
    let h = full_collaborators();
    let sid = h.engine.start("u10", None).await.unwrap().session.id;

    h.engine
        .submit_answer("u10", &sid, "background", background_answer(), None)
        .await
        .unwrap();

    let extractor = ResponseProfileExtractor::new(h.engine.repository().clone(), h.engine.catalog_handle());
    assert!(extractor.extract("u10", &sid).await.is_err());

    h.engine
        .submit_answer("u10", &sid, "review_snippet", json!({"text": "Rename things and handle errors."}), None)
        .await
        .unwrap();
    extractor.extract("u10", &sid).await.unwrap();

    let profile = h.engine.student_profile("u10").unwrap();
    assert_eq!(profile.interests, vec!["games".to_string(), "web-apps".to_string()]);
    assert_eq!(profile.goals.short_term, "Finish a JavaScript course");
    assert_eq!(profile.goals.long_term, "Work as a web developer");
    assert!(profile.assessment_scores.contains_key("web.html"));
}
