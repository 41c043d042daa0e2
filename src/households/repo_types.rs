use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::membership::MembershipType;
use crate::persons::{Gender, ResidencyStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "household_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HouseholdType {
    Family,
    RenterGroup,
    Business,
}

impl HouseholdType {
    pub fn as_str(self) -> &'static str {
        match self {
            HouseholdType::Family => "family",
            HouseholdType::RenterGroup => "renter_group",
            HouseholdType::Business => "business",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Household {
    pub id: Uuid,
    pub household_number: String,
    pub address: String,
    pub head_person_id: Option<Uuid>,
    pub household_type: HouseholdType,
    pub registered_at: Date,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// List row: household plus head name and current member count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HouseholdSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub household: Household,
    pub head_name: Option<String>,
    pub member_count: i64,
}

/// Membership joined with the person it belongs to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HouseholdMember {
    pub person_id: Uuid,
    pub full_name: String,
    pub identity_number: Option<String>,
    pub date_of_birth: Date,
    pub gender: Gender,
    pub residency_status: ResidencyStatus,
    pub relation_to_head: String,
    pub is_head: bool,
    pub membership_type: MembershipType,
    pub start_date: Date,
    pub end_date: Option<Date>,
}
