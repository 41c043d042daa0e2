use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::events::PersonEventType;
use crate::persons::ResidencyStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "temp_residence_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TempResidenceKind {
    /// Someone from elsewhere staying in the ward.
    TemporaryStay,
    /// A resident temporarily living elsewhere.
    TemporaryAbsence,
}

impl TempResidenceKind {
    pub fn event_type(self) -> PersonEventType {
        match self {
            TempResidenceKind::TemporaryStay => PersonEventType::TemporaryResident,
            TempResidenceKind::TemporaryAbsence => PersonEventType::TemporaryAbsence,
        }
    }

    /// Residency status a person holds while the registration is active.
    pub fn residency_status(self) -> ResidencyStatus {
        match self {
            TempResidenceKind::TemporaryStay => ResidencyStatus::TemporaryResident,
            TempResidenceKind::TemporaryAbsence => ResidencyStatus::TemporaryAbsent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "temp_residence_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TempResidenceStatus {
    Active,
    Expired,
    Cancelled,
}

impl TempResidenceStatus {
    /// Only active registrations move, and only to a final state.
    pub fn can_become(self, to: TempResidenceStatus) -> bool {
        self == TempResidenceStatus::Active && to != TempResidenceStatus::Active
    }
}

/// Status to restore on a person when their registration of `kind` ends.
/// Only an absence hands the person back to permanent residence.
pub fn status_after_end(
    kind: TempResidenceKind,
    current: ResidencyStatus,
) -> Option<ResidencyStatus> {
    match (kind, current) {
        (TempResidenceKind::TemporaryAbsence, ResidencyStatus::TemporaryAbsent) => {
            Some(ResidencyStatus::Permanent)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TempResidence {
    pub id: Uuid,
    pub person_id: Uuid,
    pub kind: TempResidenceKind,
    pub address: String,
    pub from_date: Date,
    pub to_date: Date,
    pub reason: Option<String>,
    pub status: TempResidenceStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Registration joined with the person's name for list pages.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TempResidenceRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: TempResidence,
    pub person_name: String,
    pub identity_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use TempResidenceStatus::*;

    #[test]
    fn only_active_moves() {
        assert!(Active.can_become(Expired));
        assert!(Active.can_become(Cancelled));
        assert!(!Active.can_become(Active));
        assert!(!Expired.can_become(Cancelled));
        assert!(!Cancelled.can_become(Expired));
    }

    #[test]
    fn ending_absence_restores_permanent() {
        assert_eq!(
            status_after_end(TempResidenceKind::TemporaryAbsence, ResidencyStatus::TemporaryAbsent),
            Some(ResidencyStatus::Permanent)
        );
        assert_eq!(
            status_after_end(TempResidenceKind::TemporaryAbsence, ResidencyStatus::MovedOut),
            None
        );
        assert_eq!(
            status_after_end(TempResidenceKind::TemporaryStay, ResidencyStatus::TemporaryResident),
            None
        );
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_value(TempResidenceKind::TemporaryAbsence).unwrap(),
            "TEMPORARY_ABSENCE"
        );
        assert_eq!(TempResidenceKind::TemporaryStay.event_type(), PersonEventType::TemporaryResident);
        assert_eq!(
            TempResidenceKind::TemporaryAbsence.residency_status(),
            ResidencyStatus::TemporaryAbsent
        );
    }
}
