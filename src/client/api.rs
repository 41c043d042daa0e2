use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ClientError;
use super::list_params::ListParams;
use super::session::Session;
use crate::auth::dto::{AuthResponse, LoginRequest, PublicUser};
use crate::error::FieldError;
use crate::response::PageMeta;
use crate::users::{CreateUserRequest, UpdateUserRequest};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
    #[serde(default)]
    pagination: Option<PageMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<FieldError>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: Option<PageMeta>,
}

#[derive(Debug, Serialize)]
struct PageQuery {
    page: u32,
    limit: u32,
}

/// HTTP client for the registry API. Attaches the session token and clears it on 401.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8080/api/v1`.
    pub fn new(base_url: impl Into<String>, session: Arc<Session>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        Ok(match self.session.token()? {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Envelope<T>, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        debug!(%status, url = %res.url(), "api response");

        if status.is_success() {
            return Ok(res.json::<Envelope<T>>().await?);
        }

        let body = res.json::<ErrorEnvelope>().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("api rejected the session token");
                self.session.handle_unauthorized()?;
                Err(ClientError::Unauthorized)
            }
            StatusCode::FORBIDDEN => Err(ClientError::Forbidden(body.message)),
            _ => Err(ClientError::Api {
                status: status.as_u16(),
                message: if body.message.is_empty() {
                    status.to_string()
                } else {
                    body.message
                },
                errors: body.errors,
            }),
        }
    }

    async fn data<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        self.send::<T>(req).await?.data.ok_or_else(|| ClientError::Api {
            status: 200,
            message: "response carried no data".into(),
            errors: Vec::new(),
        })
    }

    async fn paged<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Paged<T>, ClientError> {
        let env = self.send::<Vec<T>>(req).await?;
        Ok(Paged {
            items: env.data.unwrap_or_default(),
            pagination: env.pagination,
        })
    }

    /// Sign in and remember the access token.
    pub async fn login(&self, username: &str, password: &str) -> Result<PublicUser, ClientError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .data(self.request(Method::POST, "/auth/login")?.json(&body))
            .await?;
        self.session.sign_in(&auth.access_token, auth.user.clone())?;
        Ok(auth.user)
    }

    /// Load the profile for a stored token.
    pub async fn me(&self) -> Result<PublicUser, ClientError> {
        let user: PublicUser = self.data(self.request(Method::GET, "/me")?).await?;
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn list_users(&self, page: u32, limit: u32) -> Result<Paged<PublicUser>, ClientError> {
        self.paged(
            self.request(Method::GET, "/get-all-users")?
                .query(&PageQuery { page, limit }),
        )
        .await
    }

    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<PublicUser, ClientError> {
        self.data(self.request(Method::POST, "/create-user")?.json(req)).await
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        req: &UpdateUserRequest,
    ) -> Result<PublicUser, ClientError> {
        self.data(self.request(Method::PUT, &format!("/update-user/{id}"))?.json(req))
            .await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<Option<String>, ClientError> {
        let env = self
            .send::<serde_json::Value>(self.request(Method::DELETE, &format!("/delete-user/{id}"))?)
            .await?;
        Ok(env.message)
    }

    /// Fetch any list resource (`/persons`, `/households`, ...) with derived list params.
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ListParams,
    ) -> Result<Paged<T>, ClientError> {
        self.paged(self.request(Method::GET, path)?.query(params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::client::{access::GateDecision, MemoryTokenStore};
    use axum::{http::StatusCode as AxumStatus, routing::{get, post}, Json, Router};
    use serde_json::json;
    use time::OffsetDateTime;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/v1")
    }

    fn profile() -> PublicUser {
        PublicUser {
            id: Uuid::new_v4(),
            username: "admin".into(),
            full_name: "Ward Admin".into(),
            role: Role::Admin,
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn mock_api() -> Router {
        let user = profile();
        Router::new()
            .route(
                "/api/v1/auth/login",
                post(move || {
                    let user = user.clone();
                    async move {
                        Json(json!({
                            "success": true,
                            "data": {
                                "access_token": "access.jwt",
                                "refresh_token": "refresh.jwt",
                                "user": user
                            }
                        }))
                    }
                }),
            )
            .route(
                "/api/v1/me",
                get(|| async {
                    (
                        AxumStatus::UNAUTHORIZED,
                        Json(json!({ "success": false, "message": "Invalid or expired token" })),
                    )
                }),
            )
            .route(
                "/api/v1/create-user",
                post(|| async {
                    (
                        AxumStatus::BAD_REQUEST,
                        Json(json!({
                            "success": false,
                            "message": "Validation failed",
                            "errors": [{ "field": "username", "message": "is required" }]
                        })),
                    )
                }),
            )
    }

    #[tokio::test]
    async fn login_then_401_purges_token_and_redirects() {
        let base = spawn(mock_api()).await;
        let session = Arc::new(Session::new(Arc::new(MemoryTokenStore::default())));
        let client = ApiClient::new(base, session.clone());

        let user = client.login("admin", "secret-password").await.unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(session.token().unwrap().as_deref(), Some("access.jwt"));
        assert_eq!(session.gate("/residents"), GateDecision::Render);

        let err = client.me().await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        assert_eq!(session.token().unwrap(), None);
        assert_eq!(session.gate("/residents"), GateDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn validation_errors_surface_field_details() {
        let base = spawn(mock_api()).await;
        let session = Arc::new(Session::new(Arc::new(MemoryTokenStore::default())));
        let client = ApiClient::new(base, session);

        let req: CreateUserRequest = serde_json::from_value(json!({
            "username": "",
            "full_name": "Nobody",
            "password": "12345678"
        }))
        .unwrap();
        match client.create_user(&req).await {
            Err(ClientError::Api { status, errors, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(errors[0].field, "username");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
