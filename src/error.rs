use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

static EXPOSE_DETAILS: OnceLock<bool> = OnceLock::new();

/// Decide once at startup whether internal error chains are echoed to clients.
pub fn init_error_details(expose: bool) {
    let _ = EXPOSE_DETAILS.set(expose);
}

fn expose_details() -> bool {
    *EXPOSE_DETAILS.get().unwrap_or(&false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn field(field: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<sqlx::Error>() {
            Some(db_err) => classify_sqlx(db_err).unwrap_or(AppError::Internal(e)),
            None => AppError::Internal(e),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        classify_sqlx(&e).unwrap_or_else(|| AppError::Internal(e.into()))
    }
}

/// Map constraint violations to client errors; anything else stays internal.
fn classify_sqlx(e: &sqlx::Error) -> Option<AppError> {
    match e {
        sqlx::Error::RowNotFound => Some(AppError::NotFound("Resource not found".into())),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => Some(AppError::Conflict("Record already exists".into())),
            Some("23503") => Some(AppError::BadRequest(
                "Referenced record does not exist".into(),
            )),
            Some("23514") => Some(AppError::BadRequest("Constraint check failed".into())),
            _ => None,
        },
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => ErrorBody {
                success: false,
                message: "Validation failed".into(),
                errors: Some(errors),
                stack: None,
            },
            AppError::Internal(e) => {
                error!(error = ?e, "unhandled internal error");
                ErrorBody {
                    success: false,
                    message: "Internal server error".into(),
                    errors: None,
                    stack: expose_details().then(|| format!("{e:?}")),
                }
            }
            other => ErrorBody {
                success: false,
                message: other.to_string(),
                errors: None,
                stack: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_lists_fields() {
        let (status, json) = body_json(AppError::Validation(vec![FieldError::new(
            "full_name",
            "must not be empty",
        )]))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["errors"][0]["field"], "full_name");
    }

    #[tokio::test]
    async fn unauthorized_has_message_without_errors() {
        let (status, json) = body_json(AppError::Unauthorized("Invalid credentials".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Invalid credentials");
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn internal_error_hides_cause_by_default() {
        let (status, json) = body_json(AppError::Internal(anyhow::anyhow!("db exploded"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
        assert!(!json.to_string().contains("db exploded") || expose_details());
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err: AppError = anyhow::Error::new(sqlx::Error::RowNotFound)
            .context("load person")
            .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unrelated_anyhow_is_internal() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
