use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    AddMemberRequest, ChangeHeadRequest, CreateHouseholdRequest, EndMembershipRequest,
    HouseholdDetails, HouseholdListQuery, MembersQuery, SplitHouseholdRequest,
    UpdateHouseholdRequest,
};
use super::membership::HouseholdMembership;
use super::repo::{self, HouseholdFilter};
use super::repo_types::{Household, HouseholdSummary};
use super::services;
use crate::{
    auth::{AdminUser, AuthUser},
    dates::today,
    events::{repo as events, HouseholdHistory},
    extract::{Json, JsonOrDefault, Path, Query},
    response::{resolve_sort, search_term, ApiResponse, ApiResult, Page, SortOrder},
    state::AppState,
};

const SORT_COLUMNS: &[&str] = &["household_number", "address", "registered_at", "created_at"];

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/households", get(list_households))
        .route("/households/:id", get(get_household))
        .route("/households/:id/history", get(get_history))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/households", post(create_household))
        .route("/households/:id", axum::routing::put(update_household))
        .route("/households/:id/members", post(add_member))
        .route("/households/:id/members/:person_id/end", post(end_membership))
        .route("/households/:id/head", post(change_head))
        .route("/households/:id/split", post(split_household))
}

#[instrument(skip(state))]
pub async fn list_households(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<HouseholdListQuery>,
) -> ApiResult<Vec<HouseholdSummary>> {
    let page = Page::new(q.page, q.limit);
    let (column, order) = resolve_sort(
        q.sort_by.as_deref(),
        q.sort_order,
        SORT_COLUMNS,
        ("created_at", SortOrder::Desc),
    )?;
    let filter = HouseholdFilter {
        search: search_term(q.search.as_deref()),
        household_type: q.household_type,
    };
    let (rows, total) =
        repo::list_households(&state.db, &filter, column, order, page, today()).await?;
    Ok(ApiResponse::paged(rows, page.meta(total)))
}

#[instrument(skip(state))]
pub async fn get_household(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<MembersQuery>,
) -> ApiResult<HouseholdDetails> {
    let details = services::get_details(&state.db, id, q.include_inactive).await?;
    Ok(ApiResponse::ok(details))
}

#[instrument(skip(state))]
pub async fn get_history(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<HouseholdHistory>> {
    let rows = events::list_household_history(&state.db, id).await?;
    Ok(ApiResponse::ok(rows))
}

#[instrument(skip(state, payload))]
pub async fn create_household(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(mut payload): Json<CreateHouseholdRequest>,
) -> ApiResult<Household> {
    payload.validate()?;
    let household = services::create_household(&state.db, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(household, "Household created"))
}

#[instrument(skip(state, payload))]
pub async fn update_household(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateHouseholdRequest>,
) -> ApiResult<Household> {
    payload.validate()?;
    let household = services::update_household(&state.db, id, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(household, "Household updated"))
}

#[instrument(skip(state, payload))]
pub async fn add_member(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<AddMemberRequest>,
) -> ApiResult<HouseholdMembership> {
    payload.validate()?;
    let membership = services::add_member(&state.db, id, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(membership, "Member added"))
}

#[instrument(skip(state, payload))]
pub async fn end_membership(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((id, person_id)): Path<(Uuid, Uuid)>,
    JsonOrDefault(payload): JsonOrDefault<EndMembershipRequest>,
) -> ApiResult<HouseholdMembership> {
    let membership =
        services::end_membership(&state.db, id, person_id, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(membership, "Membership ended"))
}

#[instrument(skip(state, payload))]
pub async fn change_head(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeHeadRequest>,
) -> ApiResult<Household> {
    let household = services::change_head(&state.db, id, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(household, "Head of household changed"))
}

#[instrument(skip(state, payload))]
pub async fn split_household(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<SplitHouseholdRequest>,
) -> ApiResult<Household> {
    payload.validate()?;
    let household = services::split_household(&state.db, id, &payload, admin.id).await?;
    Ok(ApiResponse::with_message(household, "Household split"))
}
