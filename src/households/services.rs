use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{
    AddMemberRequest, ChangeHeadRequest, CreateHouseholdRequest, EndMembershipRequest,
    HouseholdDetails, SplitHouseholdRequest, UpdateHouseholdRequest, HEAD_RELATION,
};
use super::membership::{HouseholdMembership, MembershipType};
use super::repo::{self, HouseholdFields, NewHousehold};
use super::repo_types::Household;
use crate::dates::today;
use crate::error::AppError;
use crate::events::{repo as events, NewPersonEvent, PersonEventType};
use crate::persons::repo as persons;

/// A membership of the same type that would still be running after `start_date`.
/// A row ending on `start_date` hands over cleanly and does not conflict.
pub fn conflicting_membership(
    existing: &[HouseholdMembership],
    kind: MembershipType,
    start_date: Date,
) -> Option<&HouseholdMembership> {
    existing
        .iter()
        .find(|m| m.membership_type == kind && m.end_date.map_or(true, |end| end > start_date))
}

/// How one membership row takes on a new head flag and relation.
#[derive(Debug, PartialEq, Eq)]
pub enum RoleChange {
    /// The row starts on the effective date, so its flags are rewritten in place.
    InPlace(HouseholdMembership),
    /// The row is closed on the effective date and a replacement row starts that day.
    Succeed {
        closed: HouseholdMembership,
        replacement: HouseholdMembership,
    },
}

impl RoleChange {
    fn new(row: &HouseholdMembership, effective: Date, is_head: bool, relation: &str) -> Self {
        let mut replacement = row.clone();
        replacement.is_head = is_head;
        replacement.relation_to_head = relation.to_string();
        if row.start_date == effective {
            return RoleChange::InPlace(replacement);
        }
        replacement.start_date = effective;
        let mut closed = row.clone();
        closed.end_date = Some(effective);
        RoleChange::Succeed { closed, replacement }
    }
}

/// Row changes for `new_head` taking over on `effective`; `active` must be the
/// memberships active on that date.
#[derive(Debug, PartialEq, Eq)]
pub struct HeadChangePlan {
    pub outgoing: Vec<RoleChange>,
    pub incoming: RoleChange,
}

pub fn plan_head_change(
    active: &[HouseholdMembership],
    new_head: Uuid,
    previous_head_relation: &str,
    effective: Date,
) -> Result<HeadChangePlan, AppError> {
    let incoming = active
        .iter()
        .find(|m| m.person_id == new_head)
        .ok_or_else(|| {
            AppError::Conflict("New head must be an active member of the household".into())
        })?;
    if incoming.is_head {
        return Err(AppError::Conflict("Person is already the head of this household".into()));
    }

    let outgoing = active
        .iter()
        .filter(|m| m.is_head)
        .map(|m| RoleChange::new(m, effective, false, previous_head_relation))
        .collect();

    Ok(HeadChangePlan {
        outgoing,
        incoming: RoleChange::new(incoming, effective, true, HEAD_RELATION),
    })
}

async fn apply_role_change(conn: &mut PgConnection, change: &RoleChange) -> anyhow::Result<()> {
    match change {
        RoleChange::InPlace(m) => repo::set_membership_role(conn, m).await,
        RoleChange::Succeed { closed, replacement } => {
            repo::close_membership(conn, closed).await?;
            repo::insert_membership(conn, replacement).await
        }
    }
}

/// Source rows (already closed on `split_date`) paired with the relation each mover takes
/// in the new household.
pub fn plan_split(
    active: &[HouseholdMembership],
    req: &SplitHouseholdRequest,
    split_date: Date,
) -> Result<Vec<(HouseholdMembership, String)>, AppError> {
    let mut movers: Vec<(Uuid, String)> = req
        .members
        .iter()
        .map(|m| (m.person_id, m.relation_to_head.clone()))
        .collect();
    match movers.iter_mut().find(|(id, _)| *id == req.new_head_person_id) {
        Some(entry) => entry.1 = HEAD_RELATION.to_string(),
        None => movers.push((req.new_head_person_id, HEAD_RELATION.to_string())),
    }

    let mut seen = HashSet::new();
    let mut plan = Vec::with_capacity(movers.len());
    for (person_id, relation) in movers {
        if !seen.insert(person_id) {
            return Err(AppError::field("members", "a person is listed more than once"));
        }
        let mut source = active
            .iter()
            .find(|m| m.person_id == person_id)
            .cloned()
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "Person {person_id} is not an active member of the source household"
                ))
            })?;
        if source.is_head {
            return Err(AppError::Conflict(
                "The current head cannot leave in a split; change the head first".into(),
            ));
        }
        source.close(split_date)?;
        plan.push((source, relation));
    }
    Ok(plan)
}

async fn require_household(conn: &mut PgConnection, id: Uuid) -> Result<Household, AppError> {
    repo::lock_household(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Household"))
}

pub struct NewMember<'a> {
    pub household_id: Uuid,
    pub person_id: Uuid,
    pub relation_to_head: &'a str,
    pub membership_type: MembershipType,
    pub start_date: Date,
    pub is_head: bool,
    pub event_type: PersonEventType,
    pub old_household_id: Option<Uuid>,
    pub note: Option<&'a str>,
    pub actor: Uuid,
}

/// Insert a membership after eligibility checks and log the matching person event.
pub async fn add_member_tx(
    conn: &mut PgConnection,
    new: NewMember<'_>,
) -> Result<HouseholdMembership, AppError> {
    let person = persons::lock_person(conn, new.person_id)
        .await?
        .ok_or_else(|| AppError::not_found("Person"))?;
    if !person.residency_status.is_present() {
        return Err(AppError::Conflict(format!(
            "Person with status {:?} cannot join a household",
            person.residency_status
        )));
    }

    let existing = repo::current_memberships_for_person(conn, new.person_id, new.start_date).await?;
    if let Some(m) = conflicting_membership(&existing, new.membership_type, new.start_date) {
        warn!(person_id = %new.person_id, household_id = %m.household_id, "duplicate active membership");
        return Err(AppError::Conflict(format!(
            "Person already has an active {:?} membership in household {}",
            m.membership_type, m.household_id
        )));
    }

    let membership = HouseholdMembership::new(
        new.household_id,
        new.person_id,
        new.start_date,
        None,
        new.relation_to_head,
        new.is_head,
        new.membership_type,
    )?;
    repo::insert_membership(conn, &membership).await?;

    let mut ev = NewPersonEvent::new(new.person_id, new.event_type, new.start_date)
        .to_household(new.household_id)
        .note(new.note)
        .by(new.actor);
    if let Some(old) = new.old_household_id {
        ev = ev.from_household(old);
    }
    events::insert_person_event(conn, &ev).await?;
    Ok(membership)
}

pub async fn create_household(
    db: &PgPool,
    req: &CreateHouseholdRequest,
    actor: Uuid,
) -> Result<Household, AppError> {
    let registered_at = req.registered_at.unwrap_or_else(today);
    let mut tx = db.begin().await?;

    let mut household = repo::insert_household(
        &mut tx,
        &NewHousehold {
            household_number: &req.household_number,
            address: &req.address,
            household_type: req.household_type,
            registered_at,
            note: req.note.as_deref(),
        },
    )
    .await?;

    if let Some(head) = req.head_person_id {
        add_member_tx(
            &mut tx,
            NewMember {
                household_id: household.id,
                person_id: head,
                relation_to_head: HEAD_RELATION,
                membership_type: MembershipType::Permanent,
                start_date: registered_at,
                is_head: true,
                event_type: PersonEventType::MovedIn,
                old_household_id: None,
                note: None,
                actor,
            },
        )
        .await?;
        repo::set_head(&mut tx, household.id, Some(head)).await?;
        household.head_person_id = Some(head);
    }

    tx.commit().await?;
    info!(household_id = %household.id, number = %household.household_number, "household created");
    Ok(household)
}

pub async fn get_details(
    db: &PgPool,
    id: Uuid,
    include_inactive: bool,
) -> Result<HouseholdDetails, AppError> {
    let household = repo::get_household(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Household"))?;
    let members = repo::list_members(db, id, include_inactive, today()).await?;
    Ok(HouseholdDetails { household, members })
}

/// Apply field edits, writing one history row per changed field.
pub async fn update_household(
    db: &PgPool,
    id: Uuid,
    req: &UpdateHouseholdRequest,
    actor: Uuid,
) -> Result<Household, AppError> {
    let mut tx = db.begin().await?;
    let old = require_household(&mut tx, id).await?;

    let number = req.household_number.as_deref().unwrap_or(&old.household_number);
    let address = req.address.as_deref().unwrap_or(&old.address);
    let household_type = req.household_type.unwrap_or(old.household_type);
    let note = match &req.note {
        Some(n) if n.trim().is_empty() => None,
        Some(n) => Some(n.trim()),
        None => old.note.as_deref(),
    };

    let updated = repo::update_household(
        &mut tx,
        id,
        &HouseholdFields {
            household_number: number,
            address,
            household_type,
            note,
        },
    )
    .await?;

    let changes = [
        ("household_number", Some(old.household_number.as_str()), Some(number)),
        ("address", Some(old.address.as_str()), Some(address)),
        (
            "household_type",
            Some(old.household_type.as_str()),
            Some(household_type.as_str()),
        ),
        ("note", old.note.as_deref(), note),
    ];
    let mut changed = 0;
    for (field, before, after) in changes {
        if events::insert_household_change(&mut tx, id, field, before, after, Some(actor)).await? {
            changed += 1;
        }
    }

    tx.commit().await?;
    info!(household_id = %id, changed, "household updated");
    Ok(updated)
}

pub async fn add_member(
    db: &PgPool,
    household_id: Uuid,
    req: &AddMemberRequest,
    actor: Uuid,
) -> Result<HouseholdMembership, AppError> {
    let mut tx = db.begin().await?;
    require_household(&mut tx, household_id).await?;
    let membership = add_member_tx(
        &mut tx,
        NewMember {
            household_id,
            person_id: req.person_id,
            relation_to_head: &req.relation_to_head,
            membership_type: req.membership_type,
            start_date: req.start_date.unwrap_or_else(today),
            is_head: false,
            event_type: PersonEventType::MovedIn,
            old_household_id: None,
            note: req.note.as_deref(),
            actor,
        },
    )
    .await?;
    tx.commit().await?;
    info!(%household_id, person_id = %req.person_id, "member added");
    Ok(membership)
}

pub async fn end_membership(
    db: &PgPool,
    household_id: Uuid,
    person_id: Uuid,
    req: &EndMembershipRequest,
    actor: Uuid,
) -> Result<HouseholdMembership, AppError> {
    let end_date = req.end_date.unwrap_or_else(today);
    let mut tx = db.begin().await?;
    require_household(&mut tx, household_id).await?;

    let mut membership = repo::active_memberships_for_person(&mut tx, person_id, today())
        .await?
        .into_iter()
        .find(|m| m.household_id == household_id)
        .ok_or_else(|| AppError::not_found("Active membership"))?;
    if membership.is_head {
        return Err(AppError::Conflict(
            "The head cannot leave; appoint a new head first".into(),
        ));
    }
    membership.close(end_date)?;
    repo::close_membership(&mut tx, &membership).await?;

    events::insert_person_event(
        &mut tx,
        &NewPersonEvent::new(person_id, PersonEventType::MoveOut, end_date)
            .from_household(household_id)
            .note(req.note.as_deref())
            .by(actor),
    )
    .await?;

    tx.commit().await?;
    info!(%household_id, %person_id, %end_date, "membership ended");
    Ok(membership)
}

pub async fn change_head(
    db: &PgPool,
    household_id: Uuid,
    req: &ChangeHeadRequest,
    actor: Uuid,
) -> Result<Household, AppError> {
    let effective = req.effective_date.unwrap_or_else(today);
    let mut tx = db.begin().await?;
    let household = require_household(&mut tx, household_id).await?;

    let active = repo::active_memberships_for_household(&mut tx, household_id, effective).await?;
    let plan = plan_head_change(
        &active,
        req.new_head_person_id,
        req.previous_head_relation.trim(),
        effective,
    )?;

    for change in &plan.outgoing {
        apply_role_change(&mut tx, change).await?;
    }
    apply_role_change(&mut tx, &plan.incoming).await?;
    repo::set_head(&mut tx, household_id, Some(req.new_head_person_id)).await?;

    let old_value = household.head_person_id.map(|id| id.to_string());
    let new_value = req.new_head_person_id.to_string();
    events::insert_household_change(
        &mut tx,
        household_id,
        "head_person_id",
        old_value.as_deref(),
        Some(new_value.as_str()),
        Some(actor),
    )
    .await?;
    events::insert_person_event(
        &mut tx,
        &NewPersonEvent::new(req.new_head_person_id, PersonEventType::HeadChange, effective)
            .to_household(household_id)
            .note(req.note.as_deref())
            .by(actor),
    )
    .await?;

    tx.commit().await?;
    info!(%household_id, new_head = %req.new_head_person_id, "household head changed");
    Ok(Household {
        head_person_id: Some(req.new_head_person_id),
        ..household
    })
}

/// Move part of a household into a newly registered one.
pub async fn split_household(
    db: &PgPool,
    source_id: Uuid,
    req: &SplitHouseholdRequest,
    actor: Uuid,
) -> Result<Household, AppError> {
    let split_date = req.split_date.unwrap_or_else(today);
    let mut tx = db.begin().await?;
    require_household(&mut tx, source_id).await?;

    let active = repo::active_memberships_for_household(&mut tx, source_id, split_date).await?;
    let plan = plan_split(&active, req, split_date)?;

    let mut household = repo::insert_household(
        &mut tx,
        &NewHousehold {
            household_number: &req.household_number,
            address: &req.address,
            household_type: req.household_type,
            registered_at: split_date,
            note: req.note.as_deref(),
        },
    )
    .await?;

    for (closed, relation) in &plan {
        repo::close_membership(&mut tx, closed).await?;
        let is_head = closed.person_id == req.new_head_person_id;
        // The old row must be closed first so the duplicate-membership check passes.
        add_member_tx(
            &mut tx,
            NewMember {
                household_id: household.id,
                person_id: closed.person_id,
                relation_to_head: relation,
                membership_type: closed.membership_type,
                start_date: split_date,
                is_head,
                event_type: PersonEventType::SplitHousehold,
                old_household_id: Some(source_id),
                note: req.note.as_deref(),
                actor,
            },
        )
        .await?;
    }
    repo::set_head(&mut tx, household.id, Some(req.new_head_person_id)).await?;
    household.head_person_id = Some(req.new_head_person_id);

    events::insert_household_change(
        &mut tx,
        source_id,
        "split_into",
        None,
        Some(household.household_number.as_str()),
        Some(actor),
    )
    .await?;

    tx.commit().await?;
    info!(source = %source_id, new = %household.id, moved = plan.len(), "household split");
    Ok(household)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::households::dto::SplitMember;
    use crate::households::repo_types::HouseholdType;
    use time::macros::date;

    fn row(hh: Uuid, person: Uuid, is_head: bool, kind: MembershipType) -> HouseholdMembership {
        HouseholdMembership::new(
            hh,
            person,
            date!(2020 - 01 - 01),
            None,
            if is_head { HEAD_RELATION } else { "child" },
            is_head,
            kind,
        )
        .unwrap()
    }

    #[test]
    fn same_type_active_membership_conflicts() {
        let hh = Uuid::new_v4();
        let p = Uuid::new_v4();
        let rows = vec![row(hh, p, false, MembershipType::Permanent)];
        let start = date!(2024 - 01 - 01);
        assert!(conflicting_membership(&rows, MembershipType::Permanent, start).is_some());
        assert!(conflicting_membership(&rows, MembershipType::Temporary, start).is_none());
    }

    #[test]
    fn membership_ending_on_or_before_start_does_not_conflict() {
        let mut m = row(Uuid::new_v4(), Uuid::new_v4(), false, MembershipType::Permanent);
        m.close(date!(2024 - 01 - 01)).unwrap();
        let rows = [m];
        assert!(conflicting_membership(&rows, MembershipType::Permanent, date!(2024 - 01 - 01)).is_none());
        assert!(conflicting_membership(&rows, MembershipType::Permanent, date!(2024 - 02 - 01)).is_none());
        assert!(conflicting_membership(&rows, MembershipType::Permanent, date!(2023 - 12 - 31)).is_some());
    }

    #[test]
    fn head_change_keeps_history_as_rows() {
        let hh = Uuid::new_v4();
        let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
        let active = vec![
            row(hh, old, true, MembershipType::Permanent),
            row(hh, new, false, MembershipType::Permanent),
        ];
        let effective = date!(2024 - 06 - 01);
        let plan = plan_head_change(&active, new, "spouse", effective).unwrap();

        assert_eq!(plan.outgoing.len(), 1);
        match &plan.outgoing[0] {
            RoleChange::Succeed { closed, replacement } => {
                assert_eq!(closed.person_id, old);
                assert!(closed.is_head);
                assert_eq!(closed.start_date, date!(2020 - 01 - 01));
                assert_eq!(closed.end_date, Some(effective));
                assert_eq!(replacement.start_date, effective);
                assert_eq!(replacement.end_date, None);
                assert!(!replacement.is_head);
                assert_eq!(replacement.relation_to_head, "spouse");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &plan.incoming {
            RoleChange::Succeed { closed, replacement } => {
                assert!(!closed.is_head);
                assert_eq!(closed.relation_to_head, "child");
                assert_eq!(closed.end_date, Some(effective));
                assert!(replacement.is_head);
                assert_eq!(replacement.relation_to_head, HEAD_RELATION);
                assert_eq!(replacement.start_date, effective);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn head_change_on_start_date_rewrites_in_place() {
        let hh = Uuid::new_v4();
        let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
        let active = vec![
            row(hh, old, true, MembershipType::Permanent),
            row(hh, new, false, MembershipType::Permanent),
        ];
        let plan = plan_head_change(&active, new, "member", date!(2020 - 01 - 01)).unwrap();
        assert!(matches!(&plan.outgoing[0], RoleChange::InPlace(m) if !m.is_head));
        match &plan.incoming {
            RoleChange::InPlace(m) => {
                assert!(m.is_head);
                assert_eq!(m.start_date, date!(2020 - 01 - 01));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn head_change_requires_active_member() {
        let hh = Uuid::new_v4();
        let head = Uuid::new_v4();
        let active = vec![row(hh, head, true, MembershipType::Permanent)];
        assert!(matches!(
            plan_head_change(&active, Uuid::new_v4(), "member", date!(2024 - 01 - 01)),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            plan_head_change(&active, head, "member", date!(2024 - 01 - 01)),
            Err(AppError::Conflict(_))
        ));
    }

    fn split_req(new_head: Uuid, members: Vec<SplitMember>) -> SplitHouseholdRequest {
        SplitHouseholdRequest {
            household_number: "HK-2".into(),
            address: "1 Hang Bac".into(),
            household_type: HouseholdType::Family,
            new_head_person_id: new_head,
            members,
            split_date: None,
            note: None,
        }
    }

    #[test]
    fn split_moves_new_head_and_listed_members() {
        let hh = Uuid::new_v4();
        let (head, son, grandchild) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let active = vec![
            row(hh, head, true, MembershipType::Permanent),
            row(hh, son, false, MembershipType::Permanent),
            row(hh, grandchild, false, MembershipType::Permanent),
        ];
        let req = split_req(
            son,
            vec![SplitMember { person_id: grandchild, relation_to_head: "child".into() }],
        );
        let plan = plan_split(&active, &req, date!(2024 - 05 - 01)).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|(m, _)| m.end_date == Some(date!(2024 - 05 - 01))));
        let head_entry = plan.iter().find(|(m, _)| m.person_id == son).unwrap();
        assert_eq!(head_entry.1, HEAD_RELATION);
    }

    #[test]
    fn split_rejects_current_head_and_outsiders() {
        let hh = Uuid::new_v4();
        let (head, son) = (Uuid::new_v4(), Uuid::new_v4());
        let active = vec![
            row(hh, head, true, MembershipType::Permanent),
            row(hh, son, false, MembershipType::Permanent),
        ];
        let moving_head = split_req(
            son,
            vec![SplitMember { person_id: head, relation_to_head: "parent".into() }],
        );
        assert!(plan_split(&active, &moving_head, date!(2024 - 05 - 01)).is_err());

        let outsider = split_req(Uuid::new_v4(), vec![]);
        assert!(plan_split(&active, &outsider, date!(2024 - 05 - 01)).is_err());
    }

    #[test]
    fn split_date_before_membership_start_fails() {
        let hh = Uuid::new_v4();
        let son = Uuid::new_v4();
        let active = vec![row(hh, son, false, MembershipType::Permanent)];
        let req = split_req(son, vec![]);
        assert!(plan_split(&active, &req, date!(2019 - 12 - 31)).is_err());
    }
}
