use axum::{extract::State, routing::get, Router};
use tracing::instrument;

use super::services::{self, Dashboard};
use crate::{
    auth::AuthUser,
    response::{ApiResponse, ApiResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/statistics/dashboard", get(dashboard))
}

#[instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Dashboard> {
    Ok(ApiResponse::ok(services::dashboard(&state.db).await?))
}
