use anyhow::Context;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::Date;
use uuid::Uuid;

use super::repo_types::{TempResidence, TempResidenceKind, TempResidenceRow, TempResidenceStatus};
use crate::response::{Page, SortOrder};

const COLUMNS: &str = "t.id, t.person_id, t.kind, t.address, t.from_date, t.to_date, \
     t.reason, t.status, t.created_at, t.updated_at";

#[derive(Debug, Default)]
pub struct TempResidenceFilter {
    pub search: Option<String>,
    pub kind: Option<TempResidenceKind>,
    pub status: Option<TempResidenceStatus>,
    pub person_id: Option<Uuid>,
}

pub struct NewTempResidence<'a> {
    pub person_id: Uuid,
    pub kind: TempResidenceKind,
    pub address: &'a str,
    pub from_date: Date,
    pub to_date: Date,
    pub reason: Option<&'a str>,
}

pub async fn insert(conn: &mut PgConnection, t: &NewTempResidence<'_>) -> anyhow::Result<TempResidence> {
    let row = sqlx::query_as::<_, TempResidence>(&format!(
        r#"
        INSERT INTO temp_residences AS t (person_id, kind, address, from_date, to_date, reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(t.person_id)
    .bind(t.kind)
    .bind(t.address)
    .bind(t.from_date)
    .bind(t.to_date)
    .bind(t.reason)
    .fetch_one(&mut *conn)
    .await
    .context("insert temp residence")?;
    Ok(row)
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<TempResidenceRow>> {
    let row = sqlx::query_as::<_, TempResidenceRow>(&format!(
        r#"
        SELECT {COLUMNS}, p.full_name AS person_name, p.identity_number
          FROM temp_residences t
          JOIN persons p ON p.id = t.person_id
         WHERE t.id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get temp residence")?;
    Ok(row)
}

pub async fn lock(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<TempResidence>> {
    let row = sqlx::query_as::<_, TempResidence>(&format!(
        "SELECT {COLUMNS} FROM temp_residences t WHERE t.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock temp residence")?;
    Ok(row)
}

pub async fn update_details(
    conn: &mut PgConnection,
    id: Uuid,
    address: &str,
    from_date: Date,
    to_date: Date,
    reason: Option<&str>,
) -> anyhow::Result<TempResidence> {
    let row = sqlx::query_as::<_, TempResidence>(&format!(
        r#"
        UPDATE temp_residences AS t
           SET address = $2, from_date = $3, to_date = $4, reason = $5, updated_at = now()
         WHERE t.id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(address)
    .bind(from_date)
    .bind(to_date)
    .bind(reason)
    .fetch_one(&mut *conn)
    .await
    .context("update temp residence")?;
    Ok(row)
}

pub async fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: TempResidenceStatus,
) -> anyhow::Result<TempResidence> {
    let row = sqlx::query_as::<_, TempResidence>(&format!(
        r#"
        UPDATE temp_residences AS t SET status = $2, updated_at = now()
         WHERE t.id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await
    .context("set temp residence status")?;
    Ok(row)
}

/// Mark every active registration that ended before `today` as expired.
pub async fn expire_before(conn: &mut PgConnection, today: Date) -> anyhow::Result<Vec<TempResidence>> {
    let rows = sqlx::query_as::<_, TempResidence>(&format!(
        r#"
        UPDATE temp_residences AS t SET status = 'EXPIRED', updated_at = now()
         WHERE t.status = 'ACTIVE' AND t.to_date < $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(today)
    .fetch_all(&mut *conn)
    .await
    .context("expire temp residences")?;
    Ok(rows)
}

/// Whether the person still has another active registration of `kind`.
pub async fn has_other_active(
    conn: &mut PgConnection,
    person_id: Uuid,
    kind: TempResidenceKind,
    except: Uuid,
) -> anyhow::Result<bool> {
    let (found,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM temp_residences
             WHERE person_id = $1 AND kind = $2 AND status = 'ACTIVE' AND id <> $3
        )
        "#,
    )
    .bind(person_id)
    .bind(kind)
    .bind(except)
    .fetch_one(&mut *conn)
    .await
    .context("check active temp residences")?;
    Ok(found)
}

pub async fn count_active(db: &PgPool) -> anyhow::Result<Vec<(TempResidenceKind, i64)>> {
    let rows = sqlx::query_as::<_, (TempResidenceKind, i64)>(
        "SELECT kind, COUNT(*) FROM temp_residences WHERE status = 'ACTIVE' GROUP BY kind",
    )
    .fetch_all(db)
    .await
    .context("count active temp residences")?;
    Ok(rows)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &TempResidenceFilter) {
    if let Some(search) = &f.search {
        qb.push(" AND (p.full_name ILIKE ")
            .push_bind(search.clone())
            .push(" OR t.address ILIKE ")
            .push_bind(search.clone())
            .push(")");
    }
    if let Some(k) = f.kind {
        qb.push(" AND t.kind = ").push_bind(k);
    }
    if let Some(s) = f.status {
        qb.push(" AND t.status = ").push_bind(s);
    }
    if let Some(p) = f.person_id {
        qb.push(" AND t.person_id = ").push_bind(p);
    }
}

/// `sort_column` must come from the handler's whitelist.
pub async fn list(
    db: &PgPool,
    filter: &TempResidenceFilter,
    sort_column: &'static str,
    order: SortOrder,
    page: Page,
) -> anyhow::Result<(Vec<TempResidenceRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        r#"
        SELECT {COLUMNS}, p.full_name AS person_name, p.identity_number
          FROM temp_residences t
          JOIN persons p ON p.id = t.person_id
         WHERE 1 = 1"#
    ));
    push_filters(&mut qb, filter);
    qb.push(format!(" ORDER BY t.{sort_column} {}, t.id", order.as_sql()))
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb
        .build_query_as::<TempResidenceRow>()
        .fetch_all(db)
        .await
        .context("list temp residences")?;

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM temp_residences t JOIN persons p ON p.id = t.person_id WHERE 1 = 1",
    );
    push_filters(&mut count, filter);
    let (total,): (i64,) = count
        .build_query_as()
        .fetch_one(db)
        .await
        .context("count temp residences")?;

    Ok((rows, total))
}
