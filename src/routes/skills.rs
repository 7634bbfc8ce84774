use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::assessment::taxonomy::TAXONOMY;
use crate::extractors::UserId;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/taxonomy", get(taxonomy))
        .route("/profile", get(profile))
}

async fn taxonomy() -> impl IntoResponse {
    ok(TAXONOMY.dimensions())
}

async fn profile(
    UserId(user_id): UserId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().skill_profile(&user_id)?))
}
