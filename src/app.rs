use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::{auth, campaigns, households, persons, statistics, temp_residence, users};

async fn health() -> ApiResult<()> {
    Ok(ApiResponse::message("ok"))
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .route("/health", get(health))
                .merge(auth::router())
                .merge(users::router())
                .merge(persons::router())
                .merge(households::router())
                .merge(temp_residence::router())
                .merge(campaigns::router())
                .merge(statistics::router()),
        )
        .fallback(route_not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, ms, "response");
                        } else if status.is_client_error() {
                            tracing::warn!(%status, ms, "response");
                        } else {
                            tracing::info!(%status, ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{dto::JwtKeys, Role};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["success"], true);
    }

    #[tokio::test]
    async fn protected_list_without_token_is_401_envelope() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/persons").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(res).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn staff_cannot_manage_accounts() {
        let state = AppState::fake();
        let token = JwtKeys::from(&state.config.jwt)
            .sign_access(Uuid::new_v4(), Role::Staff)
            .unwrap();
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::post("/api/v1/create-user")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username":"newclerk","full_name":"New Clerk","password":"longenough"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn viewer_cannot_create_campaigns() {
        let state = AppState::fake();
        let keys = JwtKeys::from(&state.config.jwt);
        let viewer = keys.sign_access(Uuid::new_v4(), Role::Viewer).unwrap();
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::post("/api/v1/campaigns")
                    .header(header::AUTHORIZATION, format!("Bearer {viewer}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"name":"Flood relief","campaign_type":"voluntary","start_date":"2024-09-01","end_date":"2024-10-01"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_sort_column_is_rejected_before_sql() {
        let state = AppState::fake();
        let token = JwtKeys::from(&state.config.jwt)
            .sign_access(Uuid::new_v4(), Role::Viewer)
            .unwrap();
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::get("/api/v1/persons?sortBy=full_name;DROP%20TABLE%20persons")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["errors"][0]["field"], "sortBy");
    }

    fn admin_token(state: &AppState) -> String {
        JwtKeys::from(&state.config.jwt)
            .sign_access(Uuid::new_v4(), Role::Admin)
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_json_body_is_400_envelope() {
        let state = AppState::fake();
        let token = admin_token(&state);
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::post("/api/v1/campaigns")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name": "x""#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "application/json"
        );
        let body = body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn missing_json_field_is_400_not_422() {
        let state = AppState::fake();
        let token = admin_token(&state);
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::post("/api/v1/campaigns")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"Flood"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["errors"][0]["field"], "campaign_type");
    }

    #[tokio::test]
    async fn bad_query_enum_and_bad_path_uuid_are_envelopes() {
        let state = AppState::fake();
        let token = admin_token(&state);
        let app = build_app(state);
        for uri in ["/api/v1/persons?gender=robot", "/api/v1/persons/not-a-uuid"] {
            let res = app
                .clone()
                .oneshot(
                    Request::get(uri)
                        .header(header::AUTHORIZATION, format!("Bearer {token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = body_json(res).await;
            assert_eq!(body["success"], false, "{uri}");
            assert!(body["errors"].is_array(), "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["success"], false);
    }
}
