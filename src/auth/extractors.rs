use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::claims::TokenKind;
use super::dto::JwtKeys;
use super::repo_types::{Role, User};
use crate::error::AppError;

/// Roles allowed to record fees and donations.
pub const COLLECTION_ROLES: &[Role] = &[Role::Admin, Role::Staff, Role::Accountant];

/// Authenticated caller, taken from a valid access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = self.role.as_str(), "forbidden by role");
            Err(AppError::Forbidden("Insufficient permissions".into()))
        }
    }

    /// Reload the account so deactivation and role changes apply before the token expires.
    pub async fn current(self, db: &PgPool) -> Result<AuthUser, AppError> {
        let user = User::find_by_id(db, self.id).await?;
        active_account(user)
    }

    /// Role check against the token, then again against the stored account.
    pub async fn authorize(self, db: &PgPool, roles: &[Role]) -> Result<AuthUser, AppError> {
        self.require_any(roles)?;
        let user = self.current(db).await?;
        user.require_any(roles)?;
        Ok(user)
    }
}

fn active_account(user: Option<User>) -> Result<AuthUser, AppError> {
    match user {
        Some(u) if u.is_active => Ok(AuthUser {
            id: u.id,
            role: u.role,
        }),
        Some(u) => {
            warn!(user_id = %u.id, "token used by disabled account");
            Err(AppError::Unauthorized("Account is disabled".into()))
        }
        None => Err(AppError::Unauthorized("User not found".into())),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// Caller holding the `admin` role, confirmed against the stored account.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    PgPool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let db = PgPool::from_ref(state);
        Ok(AdminUser(user.authorize(&db, &[Role::Admin]).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};

    fn parts_with(header: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/api/v1/persons");
        if let Some(h) = header {
            req = req.header(AUTHORIZATION, h);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_is_not_accepted_as_access() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(Uuid::new_v4(), Role::Admin).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_extractor_rejects_staff() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_access(Uuid::new_v4(), Role::Staff).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AdminUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    fn account(role: Role, is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "clerk01".into(),
            full_name: "Ward Clerk".into(),
            role,
            password_hash: String::new(),
            is_active,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn stored_account_decides_role_and_access() {
        let demoted = account(Role::Viewer, true);
        let id = demoted.id;
        assert_eq!(
            active_account(Some(demoted)).unwrap(),
            AuthUser { id, role: Role::Viewer }
        );
        let err = active_account(Some(account(Role::Admin, false))).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(active_account(None).unwrap_err().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authorize_rejects_by_token_role_before_loading_account() {
        let state = AppState::fake();
        let user = AuthUser { id: Uuid::new_v4(), role: Role::Viewer };
        let err = user.authorize(&state.db, COLLECTION_ROLES).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn valid_access_token_yields_user_and_role() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let id = Uuid::new_v4();
        let token = keys.sign_access(id, Role::Accountant).unwrap();
        let mut parts = parts_with(Some(&format!("bearer {token}")));
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user, AuthUser { id, role: Role::Accountant });
        assert!(user.require_any(COLLECTION_ROLES).is_ok());
        assert!(user.require_any(&[Role::Admin]).is_err());
    }
}
