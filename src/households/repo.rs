use anyhow::Context;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::Date;
use uuid::Uuid;

use super::membership::HouseholdMembership;
use super::repo_types::{Household, HouseholdMember, HouseholdSummary, HouseholdType};
use crate::response::{Page, SortOrder};

const HOUSEHOLD_COLUMNS: &str = "h.id, h.household_number, h.address, h.head_person_id, \
     h.household_type, h.registered_at, h.note, h.created_at, h.updated_at";

const MEMBERSHIP_COLUMNS: &str =
    "household_id, person_id, start_date, end_date, relation_to_head, is_head, membership_type";

pub struct NewHousehold<'a> {
    pub household_number: &'a str,
    pub address: &'a str,
    pub household_type: HouseholdType,
    pub registered_at: Date,
    pub note: Option<&'a str>,
}

/// Editable columns; head changes go through the membership flow instead.
pub struct HouseholdFields<'a> {
    pub household_number: &'a str,
    pub address: &'a str,
    pub household_type: HouseholdType,
    pub note: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct HouseholdFilter {
    pub search: Option<String>,
    pub household_type: Option<HouseholdType>,
}

pub async fn insert_household(
    conn: &mut PgConnection,
    h: &NewHousehold<'_>,
) -> anyhow::Result<Household> {
    let row = sqlx::query_as::<_, Household>(&format!(
        r#"
        INSERT INTO households AS h (household_number, address, household_type, registered_at, note)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {HOUSEHOLD_COLUMNS}
        "#
    ))
    .bind(h.household_number)
    .bind(h.address)
    .bind(h.household_type)
    .bind(h.registered_at)
    .bind(h.note)
    .fetch_one(&mut *conn)
    .await
    .context("insert household")?;
    Ok(row)
}

pub async fn get_household(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Household>> {
    let row = sqlx::query_as::<_, Household>(&format!(
        "SELECT {HOUSEHOLD_COLUMNS} FROM households h WHERE h.id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get household")?;
    Ok(row)
}

/// Load and row-lock a household for the rest of the transaction.
pub async fn lock_household(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Household>> {
    let row = sqlx::query_as::<_, Household>(&format!(
        "SELECT {HOUSEHOLD_COLUMNS} FROM households h WHERE h.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock household")?;
    Ok(row)
}

pub async fn update_household(
    conn: &mut PgConnection,
    id: Uuid,
    f: &HouseholdFields<'_>,
) -> anyhow::Result<Household> {
    let row = sqlx::query_as::<_, Household>(&format!(
        r#"
        UPDATE households AS h
           SET household_number = $2,
               address          = $3,
               household_type   = $4,
               note             = $5,
               updated_at       = now()
         WHERE h.id = $1
        RETURNING {HOUSEHOLD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(f.household_number)
    .bind(f.address)
    .bind(f.household_type)
    .bind(f.note)
    .fetch_one(&mut *conn)
    .await
    .context("update household")?;
    Ok(row)
}

pub async fn set_head(
    conn: &mut PgConnection,
    household_id: Uuid,
    head_person_id: Option<Uuid>,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE households SET head_person_id = $2, updated_at = now() WHERE id = $1")
        .bind(household_id)
        .bind(head_person_id)
        .execute(&mut *conn)
        .await
        .context("set household head")?;
    Ok(())
}

fn push_household_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &HouseholdFilter) {
    if let Some(search) = &f.search {
        qb.push(" AND (h.household_number ILIKE ")
            .push_bind(search.clone())
            .push(" OR h.address ILIKE ")
            .push_bind(search.clone())
            .push(")");
    }
    if let Some(t) = f.household_type {
        qb.push(" AND h.household_type = ").push_bind(t);
    }
}

/// `sort_column` must come from the handler's whitelist.
pub async fn list_households(
    db: &PgPool,
    filter: &HouseholdFilter,
    sort_column: &'static str,
    order: SortOrder,
    page: Page,
    today: Date,
) -> anyhow::Result<(Vec<HouseholdSummary>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        r#"
        SELECT {HOUSEHOLD_COLUMNS},
               p.full_name AS head_name,
               (SELECT COUNT(*) FROM household_memberships m
                 WHERE m.household_id = h.id
                   AND m.start_date <= "#
    ));
    qb.push_bind(today)
        .push(" AND (m.end_date IS NULL OR m.end_date >= ")
        .push_bind(today)
        .push(
            r#")) AS member_count
          FROM households h
          LEFT JOIN persons p ON p.id = h.head_person_id
         WHERE 1 = 1"#,
        );
    push_household_filters(&mut qb, filter);
    qb.push(format!(" ORDER BY h.{sort_column} {}", order.as_sql()))
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb
        .build_query_as::<HouseholdSummary>()
        .fetch_all(db)
        .await
        .context("list households")?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM households h WHERE 1 = 1");
    push_household_filters(&mut count, filter);
    let (total,): (i64,) = count
        .build_query_as()
        .fetch_one(db)
        .await
        .context("count households")?;

    Ok((rows, total))
}

pub async fn count_households(db: &PgPool) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM households")
        .fetch_one(db)
        .await
        .context("count households")?;
    Ok(n)
}

pub async fn insert_membership(
    conn: &mut PgConnection,
    m: &HouseholdMembership,
) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO household_memberships ({MEMBERSHIP_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    ))
    .bind(m.household_id)
    .bind(m.person_id)
    .bind(m.start_date)
    .bind(m.end_date)
    .bind(&m.relation_to_head)
    .bind(m.is_head)
    .bind(m.membership_type)
    .execute(&mut *conn)
    .await
    .context("insert membership")?;
    Ok(())
}

/// Memberships of a person that are active on `today`, across all households.
pub async fn active_memberships_for_person(
    conn: &mut PgConnection,
    person_id: Uuid,
    today: Date,
) -> anyhow::Result<Vec<HouseholdMembership>> {
    let rows = sqlx::query_as::<_, HouseholdMembership>(&format!(
        r#"
        SELECT {MEMBERSHIP_COLUMNS}
          FROM household_memberships
         WHERE person_id = $1
           AND start_date <= $2
           AND (end_date IS NULL OR end_date >= $2)
        "#
    ))
    .bind(person_id)
    .bind(today)
    .fetch_all(&mut *conn)
    .await
    .context("active memberships for person")?;
    Ok(rows)
}

/// Memberships of a person that are open or end after `from`.
pub async fn current_memberships_for_person(
    conn: &mut PgConnection,
    person_id: Uuid,
    from: Date,
) -> anyhow::Result<Vec<HouseholdMembership>> {
    let rows = sqlx::query_as::<_, HouseholdMembership>(&format!(
        r#"
        SELECT {MEMBERSHIP_COLUMNS}
          FROM household_memberships
         WHERE person_id = $1
           AND (end_date IS NULL OR end_date > $2)
        "#
    ))
    .bind(person_id)
    .bind(from)
    .fetch_all(&mut *conn)
    .await
    .context("current memberships for person")?;
    Ok(rows)
}

/// Memberships of a household that are active on `today`.
pub async fn active_memberships_for_household(
    conn: &mut PgConnection,
    household_id: Uuid,
    today: Date,
) -> anyhow::Result<Vec<HouseholdMembership>> {
    let rows = sqlx::query_as::<_, HouseholdMembership>(&format!(
        r#"
        SELECT {MEMBERSHIP_COLUMNS}
          FROM household_memberships
         WHERE household_id = $1
           AND start_date <= $2
           AND (end_date IS NULL OR end_date >= $2)
         ORDER BY is_head DESC, start_date
        "#
    ))
    .bind(household_id)
    .bind(today)
    .fetch_all(&mut *conn)
    .await
    .context("active memberships for household")?;
    Ok(rows)
}

/// Set `end_date` on one membership row.
pub async fn close_membership(
    conn: &mut PgConnection,
    m: &HouseholdMembership,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE household_memberships
           SET end_date = $4, is_head = $5
         WHERE household_id = $1 AND person_id = $2 AND start_date = $3
        "#,
    )
    .bind(m.household_id)
    .bind(m.person_id)
    .bind(m.start_date)
    .bind(m.end_date)
    .bind(m.is_head)
    .execute(&mut *conn)
    .await
    .context("close membership")?;
    Ok(())
}

/// Update head flag and relation label of one membership row.
pub async fn set_membership_role(
    conn: &mut PgConnection,
    m: &HouseholdMembership,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE household_memberships
           SET is_head = $4, relation_to_head = $5
         WHERE household_id = $1 AND person_id = $2 AND start_date = $3
        "#,
    )
    .bind(m.household_id)
    .bind(m.person_id)
    .bind(m.start_date)
    .bind(m.is_head)
    .bind(&m.relation_to_head)
    .execute(&mut *conn)
    .await
    .context("set membership role")?;
    Ok(())
}

pub async fn list_members(
    db: &PgPool,
    household_id: Uuid,
    include_inactive: bool,
    today: Date,
) -> anyhow::Result<Vec<HouseholdMember>> {
    let rows = sqlx::query_as::<_, HouseholdMember>(
        r#"
        SELECT m.person_id, p.full_name, p.identity_number, p.date_of_birth, p.gender,
               p.residency_status, m.relation_to_head, m.is_head, m.membership_type,
               m.start_date, m.end_date
          FROM household_memberships m
          JOIN persons p ON p.id = m.person_id
         WHERE m.household_id = $1
           AND ($2 OR (m.start_date <= $3 AND (m.end_date IS NULL OR m.end_date >= $3)))
         ORDER BY m.is_head DESC, m.start_date, p.full_name
        "#,
    )
    .bind(household_id)
    .bind(include_inactive)
    .bind(today)
    .fetch_all(db)
    .await
    .context("list household members")?;
    Ok(rows)
}

pub async fn count_active_members(
    conn: &mut PgConnection,
    household_id: Uuid,
    today: Date,
) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
          FROM household_memberships
         WHERE household_id = $1
           AND start_date <= $2
           AND (end_date IS NULL OR end_date >= $2)
        "#,
    )
    .bind(household_id)
    .bind(today)
    .fetch_one(&mut *conn)
    .await
    .context("count active members")?;
    Ok(n)
}
