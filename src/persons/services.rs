use sqlx::{PgConnection, PgPool};
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CreatePersonRequest, RegistrationKind, UpdatePersonRequest};
use super::repo::{self, PersonFields};
use super::repo_types::{Person, ResidencyStatus, StatusTransitionError};
use crate::dates::today;
use crate::error::AppError;
use crate::events::{repo as events, NewPersonEvent, PersonEventType};
use crate::households::{
    repo as households,
    services::{add_member_tx, NewMember},
    HouseholdMembership,
};

impl From<StatusTransitionError> for AppError {
    fn from(e: StatusTransitionError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

async fn require_person(conn: &mut PgConnection, id: Uuid) -> Result<Person, AppError> {
    repo::lock_person(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Person"))
}

/// End date for a membership closed by an event on `event_date`; never before its start.
pub fn closing_date(m: &HouseholdMembership, event_date: Date) -> Date {
    m.start_date.max(event_date)
}

pub async fn create_person(
    db: &PgPool,
    req: &CreatePersonRequest,
    actor: Uuid,
) -> Result<Person, AppError> {
    let (event_type, default_date) = match req.registration {
        RegistrationKind::Birth => (PersonEventType::Birth, req.date_of_birth),
        RegistrationKind::MovedIn => (PersonEventType::MovedIn, today()),
    };
    let event_date = req.registered_on.unwrap_or(default_date);

    let mut tx = db.begin().await?;
    let person = repo::insert_person(
        &mut tx,
        &PersonFields {
            identity_number: req.identity_number.as_deref(),
            full_name: &req.full_name,
            date_of_birth: req.date_of_birth,
            gender: req.gender,
            birthplace: req.birthplace.as_deref(),
            native_place: req.native_place.as_deref(),
            ethnicity: req.ethnicity.as_deref(),
            occupation: req.occupation.as_deref(),
            workplace: req.workplace.as_deref(),
            permanent_address: req.permanent_address.as_deref(),
            current_address: req.current_address.as_deref(),
            id_issued_date: req.id_issued_date,
            id_issued_place: req.id_issued_place.as_deref(),
            note: req.note.as_deref(),
        },
        req.residency_status,
    )
    .await?;

    match &req.household {
        Some(join) => {
            households::lock_household(&mut tx, join.household_id)
                .await?
                .ok_or_else(|| AppError::not_found("Household"))?;
            // The membership insert logs the registration event with the target household.
            add_member_tx(
                &mut tx,
                NewMember {
                    household_id: join.household_id,
                    person_id: person.id,
                    relation_to_head: &join.relation_to_head,
                    membership_type: join.membership_type,
                    start_date: event_date,
                    is_head: false,
                    event_type,
                    old_household_id: None,
                    note: req.note.as_deref(),
                    actor,
                },
            )
            .await?;
        }
        None => {
            events::insert_person_event(
                &mut tx,
                &NewPersonEvent::new(person.id, event_type, event_date).by(actor),
            )
            .await?;
        }
    }

    tx.commit().await?;
    info!(person_id = %person.id, ?event_type, "person registered");
    Ok(person)
}

pub async fn get_person(db: &PgPool, id: Uuid) -> Result<Person, AppError> {
    repo::get_person(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Person"))
}

pub async fn update_person(
    db: &PgPool,
    id: Uuid,
    req: &UpdatePersonRequest,
) -> Result<Person, AppError> {
    let mut tx = db.begin().await?;
    let old = require_person(&mut tx, id).await?;

    let mut fields = PersonFields::of(&old);
    if let Some(v) = &req.identity_number {
        fields.identity_number = Some(v.as_str()).filter(|s| !s.is_empty());
    }
    if let Some(v) = &req.full_name {
        fields.full_name = v.as_str();
    }
    if let Some(v) = req.date_of_birth {
        fields.date_of_birth = v;
    }
    if let Some(v) = req.gender {
        fields.gender = v;
    }
    if let Some(v) = req.id_issued_date {
        fields.id_issued_date = Some(v);
    }
    let text_fields = [
        (&mut fields.birthplace, &req.birthplace),
        (&mut fields.native_place, &req.native_place),
        (&mut fields.ethnicity, &req.ethnicity),
        (&mut fields.occupation, &req.occupation),
        (&mut fields.workplace, &req.workplace),
        (&mut fields.permanent_address, &req.permanent_address),
        (&mut fields.current_address, &req.current_address),
        (&mut fields.id_issued_place, &req.id_issued_place),
        (&mut fields.note, &req.note),
    ];
    for (slot, incoming) in text_fields {
        if let Some(v) = incoming {
            *slot = Some(v.trim()).filter(|s| !s.is_empty());
        }
    }

    let updated = repo::update_person(&mut tx, id, &fields).await?;
    tx.commit().await?;
    info!(person_id = %id, "person updated");
    Ok(updated)
}

/// Move a person to `to`, log the event and, when they leave the ward, end their memberships.
pub async fn change_status(
    db: &PgPool,
    id: Uuid,
    to: ResidencyStatus,
    event_date: Option<Date>,
    note: Option<&str>,
    actor: Uuid,
) -> Result<Person, AppError> {
    let event_date = event_date.unwrap_or_else(today);
    let mut tx = db.begin().await?;
    let person = require_person(&mut tx, id).await?;
    let event_type = person.residency_status.transition_event(to)?;

    let mut left_household = None;
    if !to.is_present() {
        left_household = close_memberships(&mut tx, id, event_date, actor).await?;
    }

    let updated = repo::set_residency_status(&mut tx, id, to).await?;
    let mut ev = NewPersonEvent::new(id, event_type, event_date).note(note).by(actor);
    if let Some(h) = left_household {
        ev = ev.from_household(h);
    }
    events::insert_person_event(&mut tx, &ev).await?;

    tx.commit().await?;
    info!(person_id = %id, from = ?person.residency_status, to = ?to, "residency status changed");
    Ok(updated)
}

/// Close every open membership of a departing person. A household losing its
/// head is left without one and gets a history row. Returns a household the
/// person left, for the event log.
async fn close_memberships(
    conn: &mut PgConnection,
    person_id: Uuid,
    event_date: Date,
    actor: Uuid,
) -> Result<Option<Uuid>, AppError> {
    let open = households::current_memberships_for_person(conn, person_id, event_date)
        .await?
        .into_iter()
        .filter(|m| m.end_date.is_none());
    let mut left = None;
    for mut m in open {
        let was_head = m.is_head;
        m.is_head = false;
        m.close(closing_date(&m, event_date))?;
        households::close_membership(conn, &m).await?;
        if was_head {
            warn!(household_id = %m.household_id, %person_id, "household head left; head cleared");
            households::set_head(conn, m.household_id, None).await?;
            let old = person_id.to_string();
            events::insert_household_change(
                conn,
                m.household_id,
                "head_person_id",
                Some(old.as_str()),
                None,
                Some(actor),
            )
            .await?;
        }
        left.get_or_insert(m.household_id);
    }
    Ok(left)
}
