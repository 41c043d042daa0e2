use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::repo_types::{CampaignType, PaymentStatus};
use crate::error::{AppError, FieldError};
use crate::response::SortOrder;

fn finish(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn check_campaign(
    campaign_type: CampaignType,
    amount_per_person: Option<i64>,
    start: Date,
    end: Date,
    errors: &mut Vec<FieldError>,
) {
    if end < start {
        errors.push(FieldError::new("end_date", "must be on or after start_date"));
    }
    match amount_per_person {
        Some(a) if a < 0 => errors.push(FieldError::new("amount_per_person", "must not be negative")),
        None | Some(0) if campaign_type == CampaignType::Mandatory => errors.push(FieldError::new(
            "amount_per_person",
            "is required for mandatory campaigns",
        )),
        _ => {}
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub campaign_type: CampaignType,
    pub amount_per_person: Option<i64>,
    pub start_date: Date,
    pub end_date: Date,
    pub description: Option<String>,
}

impl CreateCampaignRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.description = self
            .description
            .take()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push(FieldError::new("name", "is required"));
        }
        check_campaign(
            self.campaign_type,
            self.amount_per_person,
            self.start_date,
            self.end_date,
            &mut errors,
        );
        finish(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub amount_per_person: Option<i64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub description: Option<String>,
}

impl UpdateCampaignRequest {
    /// Validates the request merged over the stored campaign.
    pub fn validate(
        &mut self,
        campaign_type: CampaignType,
        amount_per_person: Option<i64>,
        start: Date,
        end: Date,
    ) -> Result<(), AppError> {
        self.name = self.name.take().map(|n| n.trim().to_string());
        let mut errors = Vec::new();
        if matches!(self.name.as_deref(), Some("")) {
            errors.push(FieldError::new("name", "must not be empty"));
        }
        check_campaign(
            campaign_type,
            self.amount_per_person.or(amount_per_person),
            self.start_date.unwrap_or(start),
            self.end_date.unwrap_or(end),
            &mut errors,
        );
        finish(errors)
    }
}

/// A household payment. `amount` is added to what was already paid.
#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub household_id: Uuid,
    pub amount: i64,
    /// Overrides the computed expectation.
    pub expected_amount: Option<i64>,
    pub note: Option<String>,
}

impl RecordPaymentRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.note = self
            .note
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let mut errors = Vec::new();
        if self.amount < 0 {
            errors.push(FieldError::new("amount", "must not be negative"));
        }
        if self.expected_amount.is_some_and(|e| e < 0) {
            errors.push(FieldError::new("expected_amount", "must not be negative"));
        }
        finish(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub campaign_type: Option<CampaignType>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<PaymentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn mandatory_campaign_needs_amount() {
        let mut req = CreateCampaignRequest {
            name: " Sanitation ".into(),
            campaign_type: CampaignType::Mandatory,
            amount_per_person: None,
            start_date: date!(2024 - 01 - 01),
            end_date: date!(2024 - 12 - 31),
            description: None,
        };
        match req.validate() {
            Err(AppError::Validation(errs)) => assert_eq!(errs[0].field, "amount_per_person"),
            other => panic!("unexpected {other:?}"),
        }
        req.campaign_type = CampaignType::Voluntary;
        req.validate().unwrap();
        assert_eq!(req.name, "Sanitation");
    }

    #[test]
    fn update_checks_merged_dates() {
        let mut req = UpdateCampaignRequest {
            end_date: Some(date!(2023 - 12 - 31)),
            ..Default::default()
        };
        let err = req
            .validate(CampaignType::Voluntary, None, date!(2024 - 01 - 01), date!(2024 - 02 - 01))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e[0].field == "end_date"));
    }

    #[test]
    fn payment_rejects_negative_amount() {
        let mut req = RecordPaymentRequest {
            household_id: Uuid::nil(),
            amount: -5,
            expected_amount: None,
            note: Some("  ".into()),
        };
        assert!(req.validate().is_err());
        req.amount = 5;
        req.validate().unwrap();
        assert_eq!(req.note, None);
    }
}
