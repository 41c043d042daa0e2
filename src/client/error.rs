use thiserror::Error;

use crate::error::FieldError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session expired")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("request failed with {status}: {message}")]
    Api {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token store error: {0}")]
    Store(#[from] std::io::Error),
}

impl ClientError {
    /// Text suitable for a toast or form banner.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Unauthorized => "Your session has expired. Please sign in again.".into(),
            ClientError::Forbidden(_) => "You do not have permission to do that.".into(),
            ClientError::Api { message, errors, .. } if !errors.is_empty() => {
                let details: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{} {}", e.field, e.message))
                    .collect();
                format!("{message}: {}", details.join("; "))
            }
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Network(_) => "Cannot reach the server. Check your connection.".into(),
            ClientError::Store(_) => "Could not access saved sign-in data.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_lists_field_errors() {
        let err = ClientError::Api {
            status: 400,
            message: "Validation failed".into(),
            errors: vec![FieldError::new("username", "is required")],
        };
        assert_eq!(err.user_message(), "Validation failed: username is required");
        assert!(ClientError::Unauthorized.user_message().contains("sign in"));
    }
}
