use anyhow::Context;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::repo_types::{HouseholdHistory, NewPersonEvent, PersonEvent};

pub async fn insert_person_event(
    conn: &mut PgConnection,
    ev: &NewPersonEvent<'_>,
) -> anyhow::Result<PersonEvent> {
    let row = sqlx::query_as::<_, PersonEvent>(
        r#"
        INSERT INTO person_events
            (person_id, event_type, old_household_id, new_household_id, event_date, note, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, person_id, event_type, old_household_id, new_household_id,
                  event_date, note, created_by, created_at
        "#,
    )
    .bind(ev.person_id)
    .bind(ev.event_type)
    .bind(ev.old_household_id)
    .bind(ev.new_household_id)
    .bind(ev.event_date)
    .bind(ev.note)
    .bind(ev.created_by)
    .fetch_one(&mut *conn)
    .await
    .context("insert person event")?;
    Ok(row)
}

pub async fn list_person_events(db: &PgPool, person_id: Uuid) -> anyhow::Result<Vec<PersonEvent>> {
    let rows = sqlx::query_as::<_, PersonEvent>(
        r#"
        SELECT id, person_id, event_type, old_household_id, new_household_id,
               event_date, note, created_by, created_at
          FROM person_events
         WHERE person_id = $1
         ORDER BY event_date DESC, created_at DESC
        "#,
    )
    .bind(person_id)
    .fetch_all(db)
    .await
    .context("list person events")?;
    Ok(rows)
}

/// Record a household field change. Unchanged values are skipped.
pub async fn insert_household_change(
    conn: &mut PgConnection,
    household_id: Uuid,
    field_name: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    changed_by: Option<Uuid>,
) -> anyhow::Result<bool> {
    if old_value == new_value {
        return Ok(false);
    }
    sqlx::query(
        r#"
        INSERT INTO household_history (household_id, field_name, old_value, new_value, changed_by)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(household_id)
    .bind(field_name)
    .bind(old_value)
    .bind(new_value)
    .bind(changed_by)
    .execute(&mut *conn)
    .await
    .context("insert household history")?;
    Ok(true)
}

pub async fn list_household_history(
    db: &PgPool,
    household_id: Uuid,
) -> anyhow::Result<Vec<HouseholdHistory>> {
    let rows = sqlx::query_as::<_, HouseholdHistory>(
        r#"
        SELECT id, household_id, field_name, old_value, new_value, changed_by, changed_at
          FROM household_history
         WHERE household_id = $1
         ORDER BY changed_at DESC
        "#,
    )
    .bind(household_id)
    .fetch_all(db)
    .await
    .context("list household history")?;
    Ok(rows)
}
