use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::repo_types::{Gender, ResidencyStatus};
use crate::dates::years_before;
use crate::error::{AppError, FieldError};
use crate::households::MembershipType;
use crate::response::SortOrder;

/// Citizen ID: 9-digit legacy card or 12-digit chip card.
pub(crate) fn is_valid_identity_number(s: &str) -> bool {
    lazy_static! {
        static ref ID_RE: Regex = Regex::new(r"^\d{9}(\d{3})?$").unwrap();
    }
    ID_RE.is_match(s)
}

fn clean(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Age bracket filter used by list pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    /// Under 18.
    Child,
    /// 18 to 59.
    Adult,
    /// 60 and over.
    Senior,
}

impl AgeGroup {
    /// Birth-date window `(born_after, born_on_or_before)` for this bracket on `today`.
    pub fn birth_window(self, today: Date) -> (Option<Date>, Option<Date>) {
        let cut_18 = years_before(today, 18);
        let cut_60 = years_before(today, 60);
        match self {
            AgeGroup::Child => (Some(cut_18), None),
            AgeGroup::Adult => (Some(cut_60), Some(cut_18)),
            AgeGroup::Senior => (None, Some(cut_60)),
        }
    }
}

/// Optional household to join while registering the person.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinHousehold {
    pub household_id: Uuid,
    pub relation_to_head: String,
    #[serde(default = "default_membership_type")]
    pub membership_type: MembershipType,
}

fn default_membership_type() -> MembershipType {
    MembershipType::Permanent
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    Birth,
    MovedIn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePersonRequest {
    pub identity_number: Option<String>,
    pub full_name: String,
    pub date_of_birth: Date,
    pub gender: Gender,
    #[serde(default = "default_status")]
    pub residency_status: ResidencyStatus,
    pub birthplace: Option<String>,
    pub native_place: Option<String>,
    pub ethnicity: Option<String>,
    pub occupation: Option<String>,
    pub workplace: Option<String>,
    pub permanent_address: Option<String>,
    pub current_address: Option<String>,
    pub id_issued_date: Option<Date>,
    pub id_issued_place: Option<String>,
    pub note: Option<String>,
    #[serde(default = "default_registration")]
    pub registration: RegistrationKind,
    pub registered_on: Option<Date>,
    pub household: Option<JoinHousehold>,
}

fn default_status() -> ResidencyStatus {
    ResidencyStatus::Permanent
}

fn default_registration() -> RegistrationKind {
    RegistrationKind::MovedIn
}

impl CreatePersonRequest {
    pub fn validate(&mut self, today: Date) -> Result<(), AppError> {
        self.full_name = self.full_name.trim().to_string();
        self.identity_number = clean(self.identity_number.take());
        for field in [
            &mut self.birthplace,
            &mut self.native_place,
            &mut self.ethnicity,
            &mut self.occupation,
            &mut self.workplace,
            &mut self.permanent_address,
            &mut self.current_address,
            &mut self.id_issued_place,
            &mut self.note,
        ] {
            *field = clean(field.take());
        }

        let mut errors = Vec::new();
        if self.full_name.is_empty() {
            errors.push(FieldError::new("full_name", "is required"));
        }
        if self.date_of_birth > today {
            errors.push(FieldError::new("date_of_birth", "must not be in the future"));
        }
        if let Some(id) = &self.identity_number {
            if !is_valid_identity_number(id) {
                errors.push(FieldError::new("identity_number", "must be 9 or 12 digits"));
            }
        }
        if self.id_issued_date.is_some_and(|d| d < self.date_of_birth || d > today) {
            errors.push(FieldError::new(
                "id_issued_date",
                "must be between date_of_birth and today",
            ));
        }
        if !matches!(
            self.residency_status,
            ResidencyStatus::Permanent | ResidencyStatus::TemporaryResident
        ) {
            errors.push(FieldError::new(
                "residency_status",
                "new registrations are permanent or temporary_resident",
            ));
        }
        if let Some(h) = &mut self.household {
            h.relation_to_head = h.relation_to_head.trim().to_string();
            if h.relation_to_head.is_empty() {
                errors.push(FieldError::new("household.relation_to_head", "is required"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Profile edits. Status changes use [`ChangeStatusRequest`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePersonRequest {
    pub identity_number: Option<String>,
    pub full_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub birthplace: Option<String>,
    pub native_place: Option<String>,
    pub ethnicity: Option<String>,
    pub occupation: Option<String>,
    pub workplace: Option<String>,
    pub permanent_address: Option<String>,
    pub current_address: Option<String>,
    pub id_issued_date: Option<Date>,
    pub id_issued_place: Option<String>,
    pub note: Option<String>,
}

impl UpdatePersonRequest {
    pub fn validate(&mut self, today: Date) -> Result<(), AppError> {
        self.full_name = self.full_name.take().map(|n| n.trim().to_string());
        self.identity_number = self.identity_number.take().map(|n| n.trim().to_string());

        let mut errors = Vec::new();
        if matches!(self.full_name.as_deref(), Some("")) {
            errors.push(FieldError::new("full_name", "must not be empty"));
        }
        if self.date_of_birth.is_some_and(|d| d > today) {
            errors.push(FieldError::new("date_of_birth", "must not be in the future"));
        }
        if let Some(id) = self.identity_number.as_deref().filter(|s| !s.is_empty()) {
            if !is_valid_identity_number(id) {
                errors.push(FieldError::new("identity_number", "must be 9 or 12 digits"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: ResidencyStatus,
    pub event_date: Option<Date>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemovePersonRequest {
    pub event_date: Option<Date>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub residency_status: Option<ResidencyStatus>,
    pub age_group: Option<AgeGroup>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<SortOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn request() -> CreatePersonRequest {
        serde_json::from_value(serde_json::json!({
            "full_name": "  Le Van C ",
            "date_of_birth": "1990-04-12",
            "gender": "male",
            "identity_number": "001090123456",
            "occupation": "  "
        }))
        .unwrap()
    }

    #[test]
    fn create_defaults_and_cleanup() {
        let mut req = request();
        req.validate(date!(2024 - 01 - 01)).unwrap();
        assert_eq!(req.full_name, "Le Van C");
        assert_eq!(req.residency_status, ResidencyStatus::Permanent);
        assert_eq!(req.registration, RegistrationKind::MovedIn);
        assert_eq!(req.occupation, None);
    }

    #[test]
    fn create_rejects_bad_identity_and_future_birth() {
        let mut req = request();
        req.identity_number = Some("12AB".into());
        req.date_of_birth = date!(2030 - 01 - 01);
        match req.validate(date!(2024 - 01 - 01)) {
            Err(AppError::Validation(errs)) => {
                let fields: Vec<_> = errs.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["date_of_birth", "identity_number"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_refuses_terminal_status() {
        let mut req = request();
        req.residency_status = ResidencyStatus::Deceased;
        assert!(req.validate(date!(2024 - 01 - 01)).is_err());
    }

    #[test]
    fn identity_number_shapes() {
        assert!(is_valid_identity_number("123456789"));
        assert!(is_valid_identity_number("001090123456"));
        assert!(!is_valid_identity_number("1234567890"));
    }

    #[test]
    fn age_group_windows() {
        let today = date!(2024 - 06 - 15);
        assert_eq!(AgeGroup::Child.birth_window(today), (Some(date!(2006 - 06 - 15)), None));
        assert_eq!(
            AgeGroup::Adult.birth_window(today),
            (Some(date!(1964 - 06 - 15)), Some(date!(2006 - 06 - 15)))
        );
        assert_eq!(AgeGroup::Senior.birth_window(today), (None, Some(date!(1964 - 06 - 15))));
    }

    #[test]
    fn list_query_parses_client_params() {
        let q: PersonListQuery = serde_json::from_value(serde_json::json!({
            "page": 2, "limit": 20, "search": "abc",
            "residency_status": "permanent", "sortBy": "created_at", "sortOrder": "DESC"
        }))
        .unwrap();
        assert_eq!(q.residency_status, Some(ResidencyStatus::Permanent));
        assert_eq!(q.sort_order, Some(SortOrder::Desc));
        assert_eq!(q.gender, None);
    }
}
