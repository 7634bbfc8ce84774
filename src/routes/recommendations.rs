use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::assessment::config::RecommendationWeights;
use crate::assessment::profile::StudentProfile;
use crate::extractors::{JsonBody, UserId};
use crate::response::{ok, AppError};
use crate::state::AppState;

const MAX_RECOMMENDATIONS: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(for_current_user).post(for_profile))
}

fn checked_count(count: Option<usize>) -> Result<Option<usize>, AppError> {
    match count {
        Some(n) if n == 0 || n > MAX_RECOMMENDATIONS => Err(AppError::bad_request(
            "VALIDATION_ERROR",
            &format!("count must be between 1 and {MAX_RECOMMENDATIONS}"),
        )),
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize)]
struct CountQuery {
    count: Option<usize>,
}

/// Recommendations from the caller's stored mastery and extracted profile.
async fn for_current_user(
    UserId(user_id): UserId,
    Query(q): Query<CountQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let count = checked_count(q.count)?;
    let profile = state.engine().student_profile(&user_id)?;
    let recommendations = state.recommender().generate(&profile, count, None)?;
    tracing::debug!(user_id = %user_id, returned = recommendations.len(), "Recommendations generated");
    Ok(ok(recommendations))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecommendationRequest {
    profile: StudentProfile,
    count: Option<usize>,
    weights: Option<RecommendationWeights>,
}

/// Pure scoring of a caller-supplied profile; nothing is read or stored.
async fn for_profile(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ProfileRecommendationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let count = checked_count(req.count)?;
    let recommendations = state
        .recommender()
        .generate(&req.profile, count, req.weights)?;
    Ok(ok(recommendations))
}
