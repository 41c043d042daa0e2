use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::events::PersonEventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "residency_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResidencyStatus {
    Permanent,
    TemporaryResident,
    TemporaryAbsent,
    MovedOut,
    Deceased,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusTransitionError {
    #[error("person is already {0:?}")]
    Unchanged(ResidencyStatus),

    #[error("deceased is a final status")]
    FromDeceased,

    #[error("a moved-out person can only be registered again as permanent or temporary resident")]
    FromMovedOut,
}

impl ResidencyStatus {
    /// Still living in the ward in some form.
    pub fn is_present(self) -> bool {
        !matches!(self, ResidencyStatus::MovedOut | ResidencyStatus::Deceased)
    }

    /// Event to log when moving from `self` to `to`.
    pub fn transition_event(self, to: ResidencyStatus) -> Result<PersonEventType, StatusTransitionError> {
        use ResidencyStatus::*;
        if self == to {
            return Err(StatusTransitionError::Unchanged(to));
        }
        match (self, to) {
            (Deceased, _) => Err(StatusTransitionError::FromDeceased),
            (MovedOut, TemporaryAbsent | Deceased) => Err(StatusTransitionError::FromMovedOut),
            (_, Deceased) => Ok(PersonEventType::Death),
            (_, MovedOut) => Ok(PersonEventType::MoveOut),
            (_, TemporaryResident) => Ok(PersonEventType::TemporaryResident),
            (_, TemporaryAbsent) => Ok(PersonEventType::TemporaryAbsence),
            (_, Permanent) => Ok(PersonEventType::MovedIn),
        }
    }
}

/// Resident record. Never deleted; leaving or dying is a status change.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Person {
    pub id: Uuid,
    pub identity_number: Option<String>,
    pub full_name: String,
    pub date_of_birth: Date,
    pub gender: Gender,
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
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResidencyStatus::*;

    #[test]
    fn transitions_map_to_events() {
        assert_eq!(Permanent.transition_event(Deceased), Ok(PersonEventType::Death));
        assert_eq!(Permanent.transition_event(MovedOut), Ok(PersonEventType::MoveOut));
        assert_eq!(
            Permanent.transition_event(TemporaryAbsent),
            Ok(PersonEventType::TemporaryAbsence)
        );
        assert_eq!(TemporaryAbsent.transition_event(Permanent), Ok(PersonEventType::MovedIn));
        assert_eq!(MovedOut.transition_event(Permanent), Ok(PersonEventType::MovedIn));
    }

    #[test]
    fn deceased_is_final() {
        for to in [Permanent, TemporaryResident, TemporaryAbsent, MovedOut] {
            assert_eq!(Deceased.transition_event(to), Err(StatusTransitionError::FromDeceased));
        }
    }

    #[test]
    fn rejects_no_op_and_invalid_from_moved_out() {
        assert_eq!(
            Permanent.transition_event(Permanent),
            Err(StatusTransitionError::Unchanged(Permanent))
        );
        assert_eq!(
            MovedOut.transition_event(TemporaryAbsent),
            Err(StatusTransitionError::FromMovedOut)
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(TemporaryResident).unwrap(), "temporary_resident");
        assert!(!MovedOut.is_present());
        assert!(TemporaryAbsent.is_present());
    }
}
