use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    password::hash_password,
    repo::UserChanges,
    Role, User,
};
use crate::error::AppError;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest};

/// Hash-then-persist for new accounts. The request must already be validated.
pub async fn create_user(
    db: &PgPool,
    pepper: Option<&str>,
    req: &CreateUserRequest,
) -> Result<User, AppError> {
    if User::find_by_username(db, &req.username).await?.is_some() {
        warn!(username = %req.username, "username already taken");
        return Err(AppError::Conflict("Username already exists".into()));
    }
    let hash = hash_password(&req.password, pepper)?;
    let user = User::create(db, &req.username, &req.full_name, req.role, &hash).await?;
    info!(user_id = %user.id, username = %user.username, role = user.role.as_str(), "user created");
    Ok(user)
}

/// Apply an edit; any password present is rehashed before it reaches the store.
pub async fn update_user(
    db: &PgPool,
    pepper: Option<&str>,
    actor: Uuid,
    id: Uuid,
    req: &UpdateUserRequest,
) -> Result<User, AppError> {
    if actor == id && (req.role.is_some_and(|r| r != Role::Admin) || req.is_active == Some(false)) {
        return Err(AppError::Conflict(
            "Administrators cannot demote or disable their own account".into(),
        ));
    }

    let hash = req
        .password
        .as_deref()
        .map(|p| hash_password(p, pepper))
        .transpose()?;

    let user = User::update(
        db,
        id,
        UserChanges {
            full_name: req.full_name.as_deref(),
            role: req.role,
            is_active: req.is_active,
            password_hash: hash.as_deref(),
        },
    )
    .await?
    .ok_or_else(|| AppError::not_found("User"))?;

    info!(user_id = %user.id, password_changed = hash.is_some(), "user updated");
    Ok(user)
}

pub async fn delete_user(db: &PgPool, actor: Uuid, id: Uuid) -> Result<(), AppError> {
    if actor == id {
        return Err(AppError::Conflict("You cannot delete your own account".into()));
    }
    if !User::delete(db, id).await? {
        return Err(AppError::not_found("User"));
    }
    info!(user_id = %id, deleted_by = %actor, "user deleted");
    Ok(())
}

/// Create the configured admin account when no operator exists yet.
pub async fn ensure_bootstrap_admin(
    db: &PgPool,
    pepper: Option<&str>,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    if User::count(db).await? > 0 {
        return Ok(());
    }
    let mut req = CreateUserRequest {
        username: username.to_string(),
        full_name: "Administrator".into(),
        password: password.to_string(),
        role: Role::Admin,
    };
    req.validate()
        .map_err(|e| anyhow::anyhow!("invalid bootstrap admin: {e}"))?;
    create_user(db, pepper, &req)
        .await
        .map_err(|e| anyhow::anyhow!("bootstrap admin: {e}"))?;
    info!(username = %req.username, "bootstrap admin created");
    Ok(())
}
