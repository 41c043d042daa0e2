use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::repo_types::{TempResidenceKind, TempResidenceStatus};
use crate::error::{AppError, FieldError};
use crate::response::SortOrder;

fn check_dates(from: Date, to: Date, errors: &mut Vec<FieldError>) {
    if to < from {
        errors.push(FieldError::new("to_date", "must be on or after from_date"));
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTempResidenceRequest {
    pub person_id: Uuid,
    pub kind: TempResidenceKind,
    pub address: String,
    pub from_date: Date,
    pub to_date: Date,
    pub reason: Option<String>,
}

impl CreateTempResidenceRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.address = self.address.trim().to_string();
        self.reason = self
            .reason
            .take()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let mut errors = Vec::new();
        if self.address.is_empty() {
            errors.push(FieldError::new("address", "is required"));
        }
        check_dates(self.from_date, self.to_date, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTempResidenceRequest {
    pub address: Option<String>,
    pub from_date: Option<Date>,
    pub to_date: Option<Date>,
    pub reason: Option<String>,
}

impl UpdateTempResidenceRequest {
    /// Checks the merged date range against the stored one.
    pub fn validate(&mut self, from: Date, to: Date) -> Result<(), AppError> {
        self.address = self.address.take().map(|a| a.trim().to_string());
        let mut errors = Vec::new();
        if matches!(self.address.as_deref(), Some("")) {
            errors.push(FieldError::new("address", "must not be empty"));
        }
        check_dates(
            self.from_date.unwrap_or(from),
            self.to_date.unwrap_or(to),
            &mut errors,
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TempResidenceListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub kind: Option<TempResidenceKind>,
    pub status: Option<TempResidenceStatus>,
    pub person_id: Option<Uuid>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<SortOrder>,
}
