use serde::{Deserialize, Serialize};

use crate::auth::{dto::MIN_PASSWORD_LEN, services::is_valid_username, Role};
use crate::error::{AppError, FieldError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub full_name: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Viewer
}

impl CreateUserRequest {
    /// Normalize the username and check field rules.
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.username = self.username.trim().to_lowercase();
        self.full_name = self.full_name.trim().to_string();

        let mut errors = Vec::new();
        if !is_valid_username(&self.username) {
            errors.push(FieldError::new(
                "username",
                "must be 3-32 characters of a-z, 0-9, '.', '_' or '-'",
            ));
        }
        if self.full_name.is_empty() {
            errors.push(FieldError::new("full_name", "is required"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.full_name = self.full_name.take().map(|n| n.trim().to_string());
        // An empty password field in an edit form means "keep the current one".
        self.password = self.password.take().filter(|p| !p.is_empty());

        let mut errors = Vec::new();
        if matches!(self.full_name.as_deref(), Some("")) {
            errors.push(FieldError::new("full_name", "must not be empty"));
        }
        if self
            .password
            .as_ref()
            .is_some_and(|p| p.len() < MIN_PASSWORD_LEN)
        {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            full_name: "Tran Thi B".into(),
            password: password.into(),
            role: Role::Staff,
        }
    }

    #[test]
    fn create_normalizes_username() {
        let mut req = create("  CanBo01 ", "long-enough");
        req.validate().unwrap();
        assert_eq!(req.username, "canbo01");
    }

    #[test]
    fn create_collects_all_field_errors() {
        let mut req = create("x", "short");
        req.full_name = "   ".into();
        match req.validate() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["username", "full_name", "password"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn update_treats_blank_password_as_unchanged() {
        let mut req = UpdateUserRequest {
            password: Some(String::new()),
            ..Default::default()
        };
        req.validate().unwrap();
        assert!(req.password.is_none());

        let mut short = UpdateUserRequest {
            password: Some("123".into()),
            ..Default::default()
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn role_defaults_to_viewer() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"username":"abc","full_name":"A","password":"12345678"}"#).unwrap();
        assert_eq!(req.role, Role::Viewer);
    }
}
