use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::membership::MembershipType;
use super::repo_types::{Household, HouseholdMember, HouseholdType};
use crate::error::{AppError, FieldError};
use crate::response::SortOrder;

pub const HEAD_RELATION: &str = "head";

fn trimmed(s: &str) -> String {
    s.trim().to_string()
}

fn blank_to_none(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn finish(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateHouseholdRequest {
    pub household_number: String,
    pub address: String,
    #[serde(default = "default_household_type")]
    pub household_type: HouseholdType,
    pub registered_at: Option<Date>,
    pub head_person_id: Option<Uuid>,
    pub note: Option<String>,
}

fn default_household_type() -> HouseholdType {
    HouseholdType::Family
}

impl CreateHouseholdRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.household_number = trimmed(&self.household_number);
        self.address = trimmed(&self.address);
        self.note = blank_to_none(self.note.take());
        let mut errors = Vec::new();
        if self.household_number.is_empty() {
            errors.push(FieldError::new("household_number", "is required"));
        }
        if self.address.is_empty() {
            errors.push(FieldError::new("address", "is required"));
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateHouseholdRequest {
    pub household_number: Option<String>,
    pub address: Option<String>,
    pub household_type: Option<HouseholdType>,
    pub note: Option<String>,
}

impl UpdateHouseholdRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.household_number = self.household_number.take().map(|s| trimmed(&s));
        self.address = self.address.take().map(|s| trimmed(&s));
        let mut errors = Vec::new();
        if matches!(self.household_number.as_deref(), Some("")) {
            errors.push(FieldError::new("household_number", "must not be empty"));
        }
        if matches!(self.address.as_deref(), Some("")) {
            errors.push(FieldError::new("address", "must not be empty"));
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub person_id: Uuid,
    pub relation_to_head: String,
    #[serde(default = "default_membership_type")]
    pub membership_type: MembershipType,
    pub start_date: Option<Date>,
    pub note: Option<String>,
}

fn default_membership_type() -> MembershipType {
    MembershipType::Permanent
}

impl AddMemberRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.relation_to_head = trimmed(&self.relation_to_head);
        self.note = blank_to_none(self.note.take());
        let mut errors = Vec::new();
        if self.relation_to_head.is_empty() {
            errors.push(FieldError::new("relation_to_head", "is required"));
        } else if self.relation_to_head.eq_ignore_ascii_case(HEAD_RELATION) {
            errors.push(FieldError::new(
                "relation_to_head",
                "use the change-head operation to appoint a head",
            ));
        }
        finish(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EndMembershipRequest {
    pub end_date: Option<Date>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeHeadRequest {
    pub new_head_person_id: Uuid,
    /// Relation label the outgoing head keeps inside the household.
    #[serde(default = "default_previous_head_relation")]
    pub previous_head_relation: String,
    pub effective_date: Option<Date>,
    pub note: Option<String>,
}

fn default_previous_head_relation() -> String {
    "member".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitMember {
    pub person_id: Uuid,
    pub relation_to_head: String,
}

#[derive(Debug, Deserialize)]
pub struct SplitHouseholdRequest {
    pub household_number: String,
    pub address: String,
    #[serde(default = "default_household_type")]
    pub household_type: HouseholdType,
    pub new_head_person_id: Uuid,
    #[serde(default)]
    pub members: Vec<SplitMember>,
    pub split_date: Option<Date>,
    pub note: Option<String>,
}

impl SplitHouseholdRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.household_number = trimmed(&self.household_number);
        self.address = trimmed(&self.address);
        let mut errors = Vec::new();
        if self.household_number.is_empty() {
            errors.push(FieldError::new("household_number", "is required"));
        }
        if self.address.is_empty() {
            errors.push(FieldError::new("address", "is required"));
        }
        for (i, m) in self.members.iter_mut().enumerate() {
            m.relation_to_head = trimmed(&m.relation_to_head);
            if m.relation_to_head.is_empty() && m.person_id != self.new_head_person_id {
                errors.push(FieldError::new(
                    format!("members[{i}].relation_to_head"),
                    "is required",
                ));
            }
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct HouseholdListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub household_type: Option<HouseholdType>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MembersQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct HouseholdDetails {
    #[serde(flatten)]
    pub household: Household,
    pub members: Vec<HouseholdMember>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_member_refuses_head_relation() {
        let mut req = AddMemberRequest {
            person_id: Uuid::new_v4(),
            relation_to_head: " Head ".into(),
            membership_type: MembershipType::Permanent,
            start_date: None,
            note: None,
        };
        assert!(req.validate().is_err());
        req.relation_to_head = "child".into();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_household_requires_number_and_address() {
        let mut req: CreateHouseholdRequest =
            serde_json::from_str(r#"{"household_number":"  ","address":"12 Tran Phu"}"#).unwrap();
        assert_eq!(req.household_type, HouseholdType::Family);
        match req.validate() {
            Err(AppError::Validation(errs)) => assert_eq!(errs[0].field, "household_number"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn split_requires_relation_except_for_new_head() {
        let head = Uuid::new_v4();
        let mut req = SplitHouseholdRequest {
            household_number: "HK-02".into(),
            address: "5 Le Loi".into(),
            household_type: HouseholdType::Family,
            new_head_person_id: head,
            members: vec![
                SplitMember { person_id: head, relation_to_head: String::new() },
                SplitMember { person_id: Uuid::new_v4(), relation_to_head: " ".into() },
            ],
            split_date: None,
            note: None,
        };
        match req.validate() {
            Err(AppError::Validation(errs)) => {
                assert_eq!(errs.len(), 1);
                assert_eq!(errs[0].field, "members[1].relation_to_head");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
