use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "person_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PersonEventType {
    Birth,
    MovedIn,
    MoveOut,
    Death,
    HeadChange,
    SplitHousehold,
    TemporaryResident,
    TemporaryAbsence,
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PersonEvent {
    pub id: Uuid,
    pub person_id: Uuid,
    pub event_type: PersonEventType,
    pub old_household_id: Option<Uuid>,
    pub new_household_id: Option<Uuid>,
    pub event_date: Date,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for [`PersonEvent`].
#[derive(Debug, Clone)]
pub struct NewPersonEvent<'a> {
    pub person_id: Uuid,
    pub event_type: PersonEventType,
    pub old_household_id: Option<Uuid>,
    pub new_household_id: Option<Uuid>,
    pub event_date: Date,
    pub note: Option<&'a str>,
    pub created_by: Option<Uuid>,
}

impl<'a> NewPersonEvent<'a> {
    pub fn new(person_id: Uuid, event_type: PersonEventType, event_date: Date) -> Self {
        Self {
            person_id,
            event_type,
            old_household_id: None,
            new_household_id: None,
            event_date,
            note: None,
            created_by: None,
        }
    }

    pub fn from_household(mut self, id: Uuid) -> Self {
        self.old_household_id = Some(id);
        self
    }

    pub fn to_household(mut self, id: Uuid) -> Self {
        self.new_household_id = Some(id);
        self
    }

    pub fn note(mut self, note: Option<&'a str>) -> Self {
        self.note = note;
        self
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HouseholdHistory {
    pub id: Uuid,
    pub household_id: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub changed_at: OffsetDateTime,
}
