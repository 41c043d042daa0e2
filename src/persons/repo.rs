use anyhow::Context;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::Date;
use uuid::Uuid;

use super::repo_types::{Gender, Person, ResidencyStatus};
use crate::response::{Page, SortOrder};

const PERSON_COLUMNS: &str = "id, identity_number, full_name, date_of_birth, gender, \
     residency_status, birthplace, native_place, ethnicity, occupation, workplace, \
     permanent_address, current_address, id_issued_date, id_issued_place, note, \
     created_at, updated_at";

/// Column values for insert and full-row update.
#[derive(Debug, Clone)]
pub struct PersonFields<'a> {
    pub identity_number: Option<&'a str>,
    pub full_name: &'a str,
    pub date_of_birth: Date,
    pub gender: Gender,
    pub birthplace: Option<&'a str>,
    pub native_place: Option<&'a str>,
    pub ethnicity: Option<&'a str>,
    pub occupation: Option<&'a str>,
    pub workplace: Option<&'a str>,
    pub permanent_address: Option<&'a str>,
    pub current_address: Option<&'a str>,
    pub id_issued_date: Option<Date>,
    pub id_issued_place: Option<&'a str>,
    pub note: Option<&'a str>,
}

impl<'a> PersonFields<'a> {
    pub fn of(p: &'a Person) -> Self {
        Self {
            identity_number: p.identity_number.as_deref(),
            full_name: &p.full_name,
            date_of_birth: p.date_of_birth,
            gender: p.gender,
            birthplace: p.birthplace.as_deref(),
            native_place: p.native_place.as_deref(),
            ethnicity: p.ethnicity.as_deref(),
            occupation: p.occupation.as_deref(),
            workplace: p.workplace.as_deref(),
            permanent_address: p.permanent_address.as_deref(),
            current_address: p.current_address.as_deref(),
            id_issued_date: p.id_issued_date,
            id_issued_place: p.id_issued_place.as_deref(),
            note: p.note.as_deref(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PersonFilter {
    /// Already wrapped for ILIKE.
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub residency_status: Option<ResidencyStatus>,
    pub born_after: Option<Date>,
    pub born_on_or_before: Option<Date>,
}

pub async fn insert_person(
    conn: &mut PgConnection,
    f: &PersonFields<'_>,
    status: ResidencyStatus,
) -> anyhow::Result<Person> {
    let row = sqlx::query_as::<_, Person>(&format!(
        r#"
        INSERT INTO persons
            (identity_number, full_name, date_of_birth, gender, residency_status,
             birthplace, native_place, ethnicity, occupation, workplace,
             permanent_address, current_address, id_issued_date, id_issued_place, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING {PERSON_COLUMNS}
        "#
    ))
    .bind(f.identity_number)
    .bind(f.full_name)
    .bind(f.date_of_birth)
    .bind(f.gender)
    .bind(status)
    .bind(f.birthplace)
    .bind(f.native_place)
    .bind(f.ethnicity)
    .bind(f.occupation)
    .bind(f.workplace)
    .bind(f.permanent_address)
    .bind(f.current_address)
    .bind(f.id_issued_date)
    .bind(f.id_issued_place)
    .bind(f.note)
    .fetch_one(&mut *conn)
    .await
    .context("insert person")?;
    Ok(row)
}

pub async fn get_person(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Person>> {
    let row = sqlx::query_as::<_, Person>(&format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get person")?;
    Ok(row)
}

/// Load and row-lock a person for the rest of the transaction.
pub async fn lock_person(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Person>> {
    let row = sqlx::query_as::<_, Person>(&format!(
        "SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock person")?;
    Ok(row)
}

pub async fn update_person(
    conn: &mut PgConnection,
    id: Uuid,
    f: &PersonFields<'_>,
) -> anyhow::Result<Person> {
    let row = sqlx::query_as::<_, Person>(&format!(
        r#"
        UPDATE persons
           SET identity_number   = $2,
               full_name         = $3,
               date_of_birth     = $4,
               gender            = $5,
               birthplace        = $6,
               native_place      = $7,
               ethnicity         = $8,
               occupation        = $9,
               workplace         = $10,
               permanent_address = $11,
               current_address   = $12,
               id_issued_date    = $13,
               id_issued_place   = $14,
               note              = $15,
               updated_at        = now()
         WHERE id = $1
        RETURNING {PERSON_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(f.identity_number)
    .bind(f.full_name)
    .bind(f.date_of_birth)
    .bind(f.gender)
    .bind(f.birthplace)
    .bind(f.native_place)
    .bind(f.ethnicity)
    .bind(f.occupation)
    .bind(f.workplace)
    .bind(f.permanent_address)
    .bind(f.current_address)
    .bind(f.id_issued_date)
    .bind(f.id_issued_place)
    .bind(f.note)
    .fetch_one(&mut *conn)
    .await
    .context("update person")?;
    Ok(row)
}

pub async fn set_residency_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: ResidencyStatus,
) -> anyhow::Result<Person> {
    let row = sqlx::query_as::<_, Person>(&format!(
        r#"
        UPDATE persons SET residency_status = $2, updated_at = now()
         WHERE id = $1
        RETURNING {PERSON_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await
    .context("set residency status")?;
    Ok(row)
}

fn push_person_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &PersonFilter) {
    if let Some(search) = &f.search {
        qb.push(" AND (full_name ILIKE ")
            .push_bind(search.clone())
            .push(" OR identity_number ILIKE ")
            .push_bind(search.clone())
            .push(")");
    }
    if let Some(g) = f.gender {
        qb.push(" AND gender = ").push_bind(g);
    }
    if let Some(s) = f.residency_status {
        qb.push(" AND residency_status = ").push_bind(s);
    }
    if let Some(d) = f.born_after {
        qb.push(" AND date_of_birth > ").push_bind(d);
    }
    if let Some(d) = f.born_on_or_before {
        qb.push(" AND date_of_birth <= ").push_bind(d);
    }
}

/// `sort_column` must come from the handler's whitelist.
pub async fn list_persons(
    db: &PgPool,
    filter: &PersonFilter,
    sort_column: &'static str,
    order: SortOrder,
    page: Page,
) -> anyhow::Result<(Vec<Person>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {PERSON_COLUMNS} FROM persons WHERE 1 = 1"
    ));
    push_person_filters(&mut qb, filter);
    qb.push(format!(" ORDER BY {sort_column} {}, id", order.as_sql()))
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb
        .build_query_as::<Person>()
        .fetch_all(db)
        .await
        .context("list persons")?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM persons WHERE 1 = 1");
    push_person_filters(&mut count, filter);
    let (total,): (i64,) = count
        .build_query_as()
        .fetch_one(db)
        .await
        .context("count persons")?;

    Ok((rows, total))
}

/// Row counts grouped by an enum column, for the dashboard.
pub async fn count_by_status(db: &PgPool) -> anyhow::Result<Vec<(ResidencyStatus, i64)>> {
    let rows = sqlx::query_as::<_, (ResidencyStatus, i64)>(
        "SELECT residency_status, COUNT(*) FROM persons GROUP BY residency_status",
    )
    .fetch_all(db)
    .await
    .context("count persons by status")?;
    Ok(rows)
}

/// Gender split among people still living in the ward.
pub async fn count_present_by_gender(db: &PgPool) -> anyhow::Result<Vec<(Gender, i64)>> {
    let rows = sqlx::query_as::<_, (Gender, i64)>(
        r#"
        SELECT gender, COUNT(*) FROM persons
         WHERE residency_status NOT IN ('moved_out', 'deceased')
         GROUP BY gender
        "#,
    )
    .fetch_all(db)
    .await
    .context("count persons by gender")?;
    Ok(rows)
}

/// Present residents per age bracket as (child, adult, senior).
pub async fn count_present_by_age(db: &PgPool, today: Date) -> anyhow::Result<(i64, i64, i64)> {
    let cut_18 = crate::dates::years_before(today, 18);
    let cut_60 = crate::dates::years_before(today, 60);
    let row: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE date_of_birth > $1),
               COUNT(*) FILTER (WHERE date_of_birth <= $1 AND date_of_birth > $2),
               COUNT(*) FILTER (WHERE date_of_birth <= $2)
          FROM persons
         WHERE residency_status NOT IN ('moved_out', 'deceased')
        "#,
    )
    .bind(cut_18)
    .bind(cut_60)
    .fetch_one(db)
    .await
    .context("count persons by age")?;
    Ok(row)
}
