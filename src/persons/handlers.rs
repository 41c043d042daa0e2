use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    ChangeStatusRequest, CreatePersonRequest, PersonListQuery, RemovePersonRequest,
    UpdatePersonRequest,
};
use super::repo::{self, PersonFilter};
use super::repo_types::{Person, ResidencyStatus};
use super::services;
use crate::{
    auth::{AdminUser, AuthUser},
    dates::today,
    events::{repo as events, PersonEvent},
    extract::{Json, JsonOrDefault, Path, Query},
    response::{resolve_sort, search_term, ApiResponse, ApiResult, Page, SortOrder},
    state::AppState,
};

const SORT_COLUMNS: &[&str] = &["full_name", "created_at", "date_of_birth", "identity_number"];

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/persons", get(list_persons))
        .route("/persons/:id", get(get_person))
        .route("/persons/:id/events", get(list_events))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/persons", post(create_person))
        .route(
            "/persons/:id",
            axum::routing::put(update_person).delete(remove_person),
        )
        .route("/persons/:id/status", post(change_status))
}

#[instrument(skip(state))]
pub async fn list_persons(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<PersonListQuery>,
) -> ApiResult<Vec<Person>> {
    let page = Page::new(q.page, q.limit);
    let (column, order) = resolve_sort(
        q.sort_by.as_deref(),
        q.sort_order,
        SORT_COLUMNS,
        ("created_at", SortOrder::Desc),
    )?;
    let (born_after, born_on_or_before) = q
        .age_group
        .map(|g| g.birth_window(today()))
        .unwrap_or((None, None));
    let filter = PersonFilter {
        search: search_term(q.search.as_deref()),
        gender: q.gender,
        residency_status: q.residency_status,
        born_after,
        born_on_or_before,
    };
    let (rows, total) = repo::list_persons(&state.db, &filter, column, order, page).await?;
    Ok(ApiResponse::paged(rows, page.meta(total)))
}

#[instrument(skip(state))]
pub async fn get_person(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Person> {
    Ok(ApiResponse::ok(services::get_person(&state.db, id).await?))
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<PersonEvent>> {
    services::get_person(&state.db, id).await?;
    let rows = events::list_person_events(&state.db, id).await?;
    Ok(ApiResponse::ok(rows))
}

#[instrument(skip(state, payload))]
pub async fn create_person(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(mut payload): Json<CreatePersonRequest>,
) -> ApiResult<Person> {
    payload.validate(today())?;
    let person = services::create_person(&state.db, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(person, "Person registered"))
}

#[instrument(skip(state, payload))]
pub async fn update_person(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdatePersonRequest>,
) -> ApiResult<Person> {
    payload.validate(today())?;
    let person = services::update_person(&state.db, id, &payload).await?;
    Ok(ApiResponse::with_message(person, "Person updated"))
}

#[instrument(skip(state, payload))]
pub async fn change_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> ApiResult<Person> {
    let person = services::change_status(
        &state.db,
        id,
        payload.status,
        payload.event_date,
        payload.note.as_deref(),
        admin.id,
    )
    .await?;
    Ok(ApiResponse::with_message(person, "Residency status changed"))
}

/// Persons are never deleted; removal records a move-out.
#[instrument(skip(state, payload))]
pub async fn remove_person(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonOrDefault(payload): JsonOrDefault<RemovePersonRequest>,
) -> ApiResult<Person> {
    let person = services::change_status(
        &state.db,
        id,
        ResidencyStatus::MovedOut,
        payload.event_date,
        payload.note.as_deref(),
        admin.id,
    )
    .await?;
    Ok(ApiResponse::with_message(person, "Person marked as moved out"))
}
