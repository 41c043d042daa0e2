use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use super::dto::{CreateTempResidenceRequest, UpdateTempResidenceRequest};
use super::repo::{self, NewTempResidence};
use super::repo_types::{status_after_end, TempResidence, TempResidenceStatus};
use crate::dates::today;
use crate::error::AppError;
use crate::events::{repo as events, NewPersonEvent};
use crate::persons::repo as persons;

async fn require(conn: &mut PgConnection, id: Uuid) -> Result<TempResidence, AppError> {
    repo::lock(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Temporary residence"))
}

fn ensure_active(t: &TempResidence, to: TempResidenceStatus) -> Result<(), AppError> {
    if t.status.can_become(to) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "Registration is {:?} and can no longer change",
            t.status
        )))
    }
}

/// Register a stay or absence, log the event and move the person's status.
pub async fn create(
    db: &PgPool,
    req: &CreateTempResidenceRequest,
    actor: Uuid,
) -> Result<TempResidence, AppError> {
    let mut tx = db.begin().await?;
    let person = persons::lock_person(&mut tx, req.person_id)
        .await?
        .ok_or_else(|| AppError::not_found("Person"))?;
    if !person.residency_status.is_present() {
        return Err(AppError::Conflict(format!(
            "Person with status {:?} cannot be registered",
            person.residency_status
        )));
    }

    let record = repo::insert(
        &mut tx,
        &NewTempResidence {
            person_id: req.person_id,
            kind: req.kind,
            address: &req.address,
            from_date: req.from_date,
            to_date: req.to_date,
            reason: req.reason.as_deref(),
        },
    )
    .await?;

    let status = req.kind.residency_status();
    if person.residency_status != status {
        persons::set_residency_status(&mut tx, req.person_id, status).await?;
    }
    events::insert_person_event(
        &mut tx,
        &NewPersonEvent::new(req.person_id, req.kind.event_type(), req.from_date)
            .note(req.reason.as_deref())
            .by(actor),
    )
    .await?;

    tx.commit().await?;
    info!(id = %record.id, person_id = %record.person_id, kind = ?record.kind, "temporary residence registered");
    Ok(record)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    req: &mut UpdateTempResidenceRequest,
) -> Result<TempResidence, AppError> {
    let mut tx = db.begin().await?;
    let old = require(&mut tx, id).await?;
    if old.status != TempResidenceStatus::Active {
        return Err(AppError::Conflict("Only active registrations can be edited".into()));
    }
    req.validate(old.from_date, old.to_date)?;

    let reason = match &req.reason {
        Some(r) => Some(r.trim()).filter(|r| !r.is_empty()),
        None => old.reason.as_deref(),
    };
    let updated = repo::update_details(
        &mut tx,
        id,
        req.address.as_deref().unwrap_or(&old.address),
        req.from_date.unwrap_or(old.from_date),
        req.to_date.unwrap_or(old.to_date),
        reason,
    )
    .await?;
    tx.commit().await?;
    info!(%id, "temporary residence updated");
    Ok(updated)
}

/// Restore the person's status when their last active registration of that kind ends.
async fn release_person(conn: &mut PgConnection, ended: &TempResidence) -> Result<(), AppError> {
    if repo::has_other_active(conn, ended.person_id, ended.kind, ended.id).await? {
        return Ok(());
    }
    let Some(person) = persons::lock_person(conn, ended.person_id).await? else {
        return Ok(());
    };
    if let Some(status) = status_after_end(ended.kind, person.residency_status) {
        persons::set_residency_status(conn, ended.person_id, status).await?;
        info!(person_id = %ended.person_id, ?status, "residency restored after registration ended");
    }
    Ok(())
}

pub async fn cancel(db: &PgPool, id: Uuid) -> Result<TempResidence, AppError> {
    let mut tx = db.begin().await?;
    let old = require(&mut tx, id).await?;
    ensure_active(&old, TempResidenceStatus::Cancelled)?;
    let cancelled = repo::set_status(&mut tx, id, TempResidenceStatus::Cancelled).await?;
    release_person(&mut tx, &cancelled).await?;
    tx.commit().await?;
    info!(%id, "temporary residence cancelled");
    Ok(cancelled)
}

/// Expire every active registration whose end date has passed. Returns how many changed.
pub async fn expire_overdue(db: &PgPool) -> Result<usize, AppError> {
    let mut tx = db.begin().await?;
    let expired = repo::expire_before(&mut tx, today()).await?;
    for t in &expired {
        release_person(&mut tx, t).await?;
    }
    tx.commit().await?;
    info!(count = expired.len(), "temporary residences expired");
    Ok(expired.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp_residence::TempResidenceKind;
    use time::{macros::date, OffsetDateTime};

    fn record(status: TempResidenceStatus) -> TempResidence {
        TempResidence {
            id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            kind: TempResidenceKind::TemporaryAbsence,
            address: "Da Nang".into(),
            from_date: date!(2024 - 01 - 01),
            to_date: date!(2024 - 06 - 30),
            reason: None,
            status,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn cancel_requires_active() {
        assert!(ensure_active(&record(TempResidenceStatus::Active), TempResidenceStatus::Cancelled).is_ok());
        let err = ensure_active(&record(TempResidenceStatus::Expired), TempResidenceStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }
}
