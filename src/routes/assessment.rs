use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assessment::types::StepConfig;
use crate::extractors::{JsonBody, UserId};
use crate::response::{ok, AppError};
use crate::state::AppState;

/// Upper bound on self-reported time per step (one day).
const MAX_TIME_SPENT_SECS: u32 = 86_400;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(start_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/current-step", get(current_step))
        .route("/sessions/:id/responses", get(list_responses).post(submit_response))
        .route("/sessions/:id/previous", post(go_to_previous))
        .route("/sessions/:id/abandon", post(abandon_session))
        .route("/steps", get(list_steps))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    session_type: Option<String>,
}

async fn start_session(
    UserId(user_id): UserId,
    State(state): State<AppState>,
    body: Option<JsonBody<StartSessionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let req = body.map(|JsonBody(r)| r).unwrap_or_default();
    let outcome = state
        .engine()
        .start(&user_id, req.session_type.as_deref())
        .await?;
    Ok(ok(outcome))
}

async fn list_sessions(
    UserId(user_id): UserId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().list_sessions(&user_id)?))
}

async fn get_session(
    UserId(user_id): UserId,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().get_session(&user_id, &session_id)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentStepResponse {
    current_step: Option<StepConfig>,
}

async fn current_step(
    UserId(user_id): UserId,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let current_step = state.engine().current_step(&user_id, &session_id)?;
    Ok(ok(CurrentStepResponse { current_step }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponseRequest {
    step_id: String,
    #[serde(default)]
    answer: Value,
    time_spent_secs: Option<u32>,
}

async fn submit_response(
    UserId(user_id): UserId,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SubmitResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let step_id = req.step_id.trim();
    if step_id.is_empty() {
        return Err(AppError::bad_request("VALIDATION_ERROR", "stepId is required"));
    }
    if req.time_spent_secs.is_some_and(|t| t > MAX_TIME_SPENT_SECS) {
        return Err(AppError::bad_request(
            "VALIDATION_ERROR",
            "timeSpentSecs is out of range",
        ));
    }

    let outcome = state
        .engine()
        .submit_answer(&user_id, &session_id, step_id, req.answer, req.time_spent_secs)
        .await?;
    Ok(ok(outcome))
}

async fn list_responses(
    UserId(user_id): UserId,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().list_responses(&user_id, &session_id)?))
}

async fn go_to_previous(
    UserId(user_id): UserId,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let current_step = state.engine().go_to_previous(&user_id, &session_id).await?;
    Ok(ok(CurrentStepResponse { current_step }))
}

async fn abandon_session(
    UserId(user_id): UserId,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().abandon(&user_id, &session_id).await?))
}

async fn list_steps(State(state): State<AppState>) -> impl IntoResponse {
    let steps: Vec<StepConfig> = state
        .engine()
        .catalog()
        .steps()
        .iter()
        .map(StepConfig::redacted)
        .collect();
    ok(steps)
}
