use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateTempResidenceRequest, TempResidenceListQuery, UpdateTempResidenceRequest};
use super::repo::{self, TempResidenceFilter};
use super::repo_types::{TempResidence, TempResidenceRow};
use super::services;
use crate::{
    auth::{AdminUser, AuthUser},
    error::AppError,
    extract::{Json, Path, Query},
    response::{resolve_sort, search_term, ApiResponse, ApiResult, Page, SortOrder},
    state::AppState,
};

const SORT_COLUMNS: &[&str] = &["from_date", "to_date", "created_at"];

#[derive(Debug, Serialize)]
pub struct ExpireSummary {
    pub expired: usize,
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/temp-residences", get(list))
        .route("/temp-residences/:id", get(get_one))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/temp-residences", post(create))
        .route("/temp-residences/expire", post(expire))
        .route("/temp-residences/:id", axum::routing::put(update))
        .route("/temp-residences/:id/cancel", post(cancel))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<TempResidenceListQuery>,
) -> ApiResult<Vec<TempResidenceRow>> {
    let page = Page::new(q.page, q.limit);
    let (column, order) = resolve_sort(
        q.sort_by.as_deref(),
        q.sort_order,
        SORT_COLUMNS,
        ("created_at", SortOrder::Desc),
    )?;
    let filter = TempResidenceFilter {
        search: search_term(q.search.as_deref()),
        kind: q.kind,
        status: q.status,
        person_id: q.person_id,
    };
    let (rows, total) = repo::list(&state.db, &filter, column, order, page).await?;
    Ok(ApiResponse::paged(rows, page.meta(total)))
}

#[instrument(skip(state))]
pub async fn get_one(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<TempResidenceRow> {
    let row = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Temporary residence"))?;
    Ok(ApiResponse::ok(row))
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(mut payload): Json<CreateTempResidenceRequest>,
) -> ApiResult<TempResidence> {
    payload.validate()?;
    let record = services::create(&state.db, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(record, "Temporary residence registered"))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateTempResidenceRequest>,
) -> ApiResult<TempResidence> {
    let record = services::update(&state.db, id, &mut payload).await?;
    Ok(ApiResponse::with_message(record, "Temporary residence updated"))
}

#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<TempResidence> {
    let record = services::cancel(&state.db, id).await?;
    Ok(ApiResponse::with_message(record, "Temporary residence cancelled"))
}

#[instrument(skip(state))]
pub async fn expire(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<ExpireSummary> {
    let expired = services::expire_overdue(&state.db).await?;
    Ok(ApiResponse::ok(ExpireSummary { expired }))
}
