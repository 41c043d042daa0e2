use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipType {
    Permanent,
    Temporary,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("end_date {end} is before start_date {start}")]
    EndBeforeStart { start: Date, end: Date },

    #[error("membership already ended on {0}")]
    AlreadyEnded(Date),
}

impl From<MembershipError> for AppError {
    fn from(e: MembershipError) -> Self {
        match e {
            MembershipError::EndBeforeStart { .. } => AppError::field("end_date", &e.to_string()),
            MembershipError::AlreadyEnded(_) => AppError::Conflict(e.to_string()),
        }
    }
}

/// Time-bounded link between a person and a household.
/// Identified by (household_id, person_id, start_date); history is kept as rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HouseholdMembership {
    pub household_id: Uuid,
    pub person_id: Uuid,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub relation_to_head: String,
    pub is_head: bool,
    pub membership_type: MembershipType,
}

impl HouseholdMembership {
    pub fn new(
        household_id: Uuid,
        person_id: Uuid,
        start_date: Date,
        end_date: Option<Date>,
        relation_to_head: impl Into<String>,
        is_head: bool,
        membership_type: MembershipType,
    ) -> Result<Self, MembershipError> {
        check_range(start_date, end_date)?;
        Ok(Self {
            household_id,
            person_id,
            start_date,
            end_date,
            relation_to_head: relation_to_head.into(),
            is_head,
            membership_type,
        })
    }

    /// `start_date <= today` and the membership has not ended before `today`.
    pub fn is_active(&self, today: Date) -> bool {
        self.start_date <= today && self.end_date.map_or(true, |end| end >= today)
    }

    /// Close an open membership on `end_date`.
    pub fn close(&mut self, end_date: Date) -> Result<(), MembershipError> {
        if let Some(ended) = self.end_date {
            return Err(MembershipError::AlreadyEnded(ended));
        }
        check_range(self.start_date, Some(end_date))?;
        self.end_date = Some(end_date);
        Ok(())
    }
}

fn check_range(start: Date, end: Option<Date>) -> Result<(), MembershipError> {
    match end {
        Some(end) if end < start => Err(MembershipError::EndBeforeStart { start, end }),
        _ => Ok(()),
    }
}
