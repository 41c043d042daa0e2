use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, AdminUser, User},
    extract::{Json, Path, Query},
    response::{search_term, ApiResponse, ApiResult, Page},
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest, UserListQuery},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/get-all-users", get(get_all_users))
        .route("/create-user", post(create_user))
        .route("/update-user/:id", put(update_user))
        .route("/delete-user/:id", delete(delete_user))
}

#[instrument(skip(state))]
pub async fn get_all_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<UserListQuery>,
) -> ApiResult<Vec<PublicUser>> {
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search.as_deref());
    let (users, total) =
        User::list(&state.db, search.as_deref(), q.role, page.limit, page.offset()).await?;
    Ok(ApiResponse::paged(
        users.into_iter().map(PublicUser::from).collect(),
        page.meta(total),
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(mut payload): Json<CreateUserRequest>,
) -> ApiResult<PublicUser> {
    payload.validate()?;
    let user = services::create_user(&state.db, state.pepper(), &payload).await?;
    Ok(ApiResponse::with_message(user.into(), "User created"))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> ApiResult<PublicUser> {
    payload.validate()?;
    let user = services::update_user(&state.db, state.pepper(), admin.id, id, &payload).await?;
    Ok(ApiResponse::with_message(user.into(), "User updated"))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    services::delete_user(&state.db, admin.id, id).await?;
    Ok(ApiResponse::message("User deleted"))
}
