use axum::{
    extract::State,
    routing::get,
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    CampaignListQuery, CreateCampaignRequest, PaymentListQuery, RecordPaymentRequest,
    UpdateCampaignRequest,
};
use super::repo::{self, CampaignFilter};
use super::repo_types::{Campaign, CampaignPayment, CampaignSummary, PaymentRow};
use super::services;
use crate::{
    auth::{extractors::COLLECTION_ROLES, AuthUser},
    error::AppError,
    extract::{Json, Path, Query},
    response::{resolve_sort, search_term, ApiResponse, ApiResult, Page, SortOrder},
    state::AppState,
};

const SORT_COLUMNS: &[&str] = &["name", "start_date", "end_date", "created_at"];

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(get_campaign))
        .route("/campaigns/:id/payments", get(list_payments))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", axum::routing::post(create_campaign))
        .route(
            "/campaigns/:id",
            axum::routing::put(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/:id/payments", axum::routing::post(record_payment))
}

#[instrument(skip(state))]
pub async fn list_campaigns(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<CampaignListQuery>,
) -> ApiResult<Vec<CampaignSummary>> {
    let page = Page::new(q.page, q.limit);
    let (column, order) = resolve_sort(
        q.sort_by.as_deref(),
        q.sort_order,
        SORT_COLUMNS,
        ("start_date", SortOrder::Desc),
    )?;
    let filter = CampaignFilter {
        search: search_term(q.search.as_deref()),
        campaign_type: q.campaign_type,
    };
    let (rows, total) = repo::list(&state.db, &filter, column, order, page).await?;
    Ok(ApiResponse::paged(rows, page.meta(total)))
}

#[instrument(skip(state))]
pub async fn get_campaign(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<CampaignSummary> {
    let row = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Campaign"))?;
    Ok(ApiResponse::ok(row))
}

#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<PaymentListQuery>,
) -> ApiResult<Vec<PaymentRow>> {
    let page = Page::new(q.page, q.limit);
    let (rows, total) = repo::list_payments(&state.db, id, q.status, page).await?;
    Ok(ApiResponse::paged(rows, page.meta(total)))
}

#[instrument(skip(state, payload))]
pub async fn create_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(mut payload): Json<CreateCampaignRequest>,
) -> ApiResult<Campaign> {
    user.authorize(&state.db, COLLECTION_ROLES).await?;
    payload.validate()?;
    let campaign = services::create_campaign(&state.db, &payload).await?;
    Ok(ApiResponse::with_message(campaign, "Campaign created"))
}

#[instrument(skip(state, payload))]
pub async fn update_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateCampaignRequest>,
) -> ApiResult<Campaign> {
    user.authorize(&state.db, COLLECTION_ROLES).await?;
    let campaign = services::update_campaign(&state.db, id, &mut payload).await?;
    Ok(ApiResponse::with_message(campaign, "Campaign updated"))
}

#[instrument(skip(state))]
pub async fn delete_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    user.authorize(&state.db, COLLECTION_ROLES).await?;
    services::delete_campaign(&state.db, id).await?;
    Ok(ApiResponse::message("Campaign deleted"))
}

#[instrument(skip(state, payload))]
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<RecordPaymentRequest>,
) -> ApiResult<CampaignPayment> {
    user.authorize(&state.db, COLLECTION_ROLES).await?;
    payload.validate()?;
    let payment = services::record_payment(&state.db, id, &payload).await?;
    Ok(ApiResponse::with_message(payment, "Payment recorded"))
}
