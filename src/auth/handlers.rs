use axum::{
    extract::{FromRef, State},
    routing::{get, post, put},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RefreshRequest},
        extractors::AuthUser,
        password::{hash_password, verify_password},
        repo::UserChanges,
        repo_types::User,
        services::JwtKeys,
    },
    error::AppError,
    extract::Json,
    response::{ApiResponse, ApiResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/password", put(change_password))
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, AppError> {
    let access_token = keys.sign_access(user.id, user.role)?;
    let refresh_token = keys.sign_refresh(user.id, user.role)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    payload.username = payload.username.trim().to_lowercase();

    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(vec![
            crate::error::FieldError::new("username", "username and password are required"),
        ]));
    }

    let user = match User::find_by_username(&state.db, &payload.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %payload.username, "login unknown username");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash, state.pepper())?;
    if !ok {
        warn!(username = %payload.username, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login on disabled account");
        return Err(AppError::Forbidden("Account is disabled".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(ApiResponse::with_message(
        issue_tokens(&keys, user)?,
        "Login successful",
    ))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<AuthResponse> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    // Reload so role changes and deactivation take effect on refresh.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(ApiResponse::ok(issue_tokens(&keys, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<PublicUser> {
    let user = User::find_by_id(&state.db, auth.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(ApiResponse::ok(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    payload.validate()?;

    let user = User::find_by_id(&state.db, auth.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let ok = verify_password(&payload.current_password, &user.password_hash, state.pepper())?;
    if !ok {
        return Err(AppError::field("current_password", "is incorrect"));
    }

    let hash = hash_password(&payload.new_password, state.pepper())?;
    User::update(
        &state.db,
        user.id,
        UserChanges {
            password_hash: Some(&hash),
            ..Default::default()
        },
    )
    .await?;

    info!(user_id = %user.id, "password changed");
    Ok(ApiResponse::message("Password updated"))
}

#[cfg(test)]
mod me_tests {
    use super::*;
    use crate::auth::repo_types::Role;

    #[test]
    fn test_me_response_serialization() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            username: "canbo01".to_string(),
            full_name: "Nguyen Van A".to_string(),
            role: Role::Staff,
            is_active: true,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["username"], "canbo01");
        assert_eq!(json["role"], "staff");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn issued_tokens_carry_role() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = User {
            id: uuid::Uuid::new_v4(),
            username: "ketoan".into(),
            full_name: "Ke Toan".into(),
            role: Role::Accountant,
            password_hash: "x".into(),
            is_active: true,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let res = issue_tokens(&keys, user.clone()).unwrap();
        assert_eq!(keys.verify(&res.access_token).unwrap().role, Role::Accountant);
        assert!(keys.verify_refresh(&res.refresh_token).is_ok());
        assert_eq!(res.user.id, user.id);
    }
}
