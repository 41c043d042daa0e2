use anyhow::Context;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::Date;
use uuid::Uuid;

use super::repo_types::{
    Campaign, CampaignPayment, CampaignSummary, CampaignType, PaymentRow, PaymentStatus,
};
use crate::response::{Page, SortOrder};

const CAMPAIGN_COLUMNS: &str = "c.id, c.name, c.campaign_type, c.amount_per_person, \
     c.start_date, c.end_date, c.description, c.created_at, c.updated_at";

const PAYMENT_COLUMNS: &str = "cp.id, cp.campaign_id, cp.household_id, cp.expected_amount, \
     cp.paid_amount, cp.status, cp.paid_at, cp.note, cp.created_at, cp.updated_at";

const TOTALS: &str = r#"
       COALESCE((SELECT SUM(expected_amount) FROM campaign_payments WHERE campaign_id = c.id), 0)::BIGINT AS expected_total,
       COALESCE((SELECT SUM(paid_amount) FROM campaign_payments WHERE campaign_id = c.id), 0)::BIGINT AS collected_total,
       (SELECT COUNT(*) FROM campaign_payments WHERE campaign_id = c.id AND status = 'paid') AS paid_households"#;

pub struct CampaignFields<'a> {
    pub name: &'a str,
    pub campaign_type: CampaignType,
    pub amount_per_person: Option<i64>,
    pub start_date: Date,
    pub end_date: Date,
    pub description: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct CampaignFilter {
    pub search: Option<String>,
    pub campaign_type: Option<CampaignType>,
}

pub async fn insert(db: &PgPool, f: &CampaignFields<'_>) -> anyhow::Result<Campaign> {
    let row = sqlx::query_as::<_, Campaign>(&format!(
        r#"
        INSERT INTO campaigns AS c
            (name, campaign_type, amount_per_person, start_date, end_date, description)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {CAMPAIGN_COLUMNS}
        "#
    ))
    .bind(f.name)
    .bind(f.campaign_type)
    .bind(f.amount_per_person)
    .bind(f.start_date)
    .bind(f.end_date)
    .bind(f.description)
    .fetch_one(db)
    .await
    .context("insert campaign")?;
    Ok(row)
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<CampaignSummary>> {
    let row = sqlx::query_as::<_, CampaignSummary>(&format!(
        "SELECT {CAMPAIGN_COLUMNS}, {TOTALS} FROM campaigns c WHERE c.id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get campaign")?;
    Ok(row)
}

pub async fn lock(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Campaign>> {
    let row = sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c WHERE c.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock campaign")?;
    Ok(row)
}

pub async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    f: &CampaignFields<'_>,
) -> anyhow::Result<Campaign> {
    let row = sqlx::query_as::<_, Campaign>(&format!(
        r#"
        UPDATE campaigns AS c
           SET name = $2, amount_per_person = $3, start_date = $4, end_date = $5,
               description = $6, updated_at = now()
         WHERE c.id = $1
        RETURNING {CAMPAIGN_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(f.name)
    .bind(f.amount_per_person)
    .bind(f.start_date)
    .bind(f.end_date)
    .bind(f.description)
    .fetch_one(&mut *conn)
    .await
    .context("update campaign")?;
    Ok(row)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("delete campaign")?;
    Ok(res.rows_affected() > 0)
}

pub async fn collected_amount(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(paid_amount), 0)::BIGINT FROM campaign_payments WHERE campaign_id = $1",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .context("sum campaign payments")?;
    Ok(n)
}

fn push_campaign_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &CampaignFilter) {
    if let Some(search) = &f.search {
        qb.push(" AND c.name ILIKE ").push_bind(search.clone());
    }
    if let Some(t) = f.campaign_type {
        qb.push(" AND c.campaign_type = ").push_bind(t);
    }
}

/// `sort_column` must come from the handler's whitelist.
pub async fn list(
    db: &PgPool,
    filter: &CampaignFilter,
    sort_column: &'static str,
    order: SortOrder,
    page: Page,
) -> anyhow::Result<(Vec<CampaignSummary>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {CAMPAIGN_COLUMNS}, {TOTALS} FROM campaigns c WHERE 1 = 1"
    ));
    push_campaign_filters(&mut qb, filter);
    qb.push(format!(" ORDER BY c.{sort_column} {}, c.id", order.as_sql()))
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb
        .build_query_as::<CampaignSummary>()
        .fetch_all(db)
        .await
        .context("list campaigns")?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM campaigns c WHERE 1 = 1");
    push_campaign_filters(&mut count, filter);
    let (total,): (i64,) = count
        .build_query_as()
        .fetch_one(db)
        .await
        .context("count campaigns")?;

    Ok((rows, total))
}

pub async fn lock_payment(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    household_id: Uuid,
) -> anyhow::Result<Option<CampaignPayment>> {
    let row = sqlx::query_as::<_, CampaignPayment>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS} FROM campaign_payments cp
         WHERE cp.campaign_id = $1 AND cp.household_id = $2
           FOR UPDATE
        "#
    ))
    .bind(campaign_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock payment")?;
    Ok(row)
}

pub struct PaymentFields<'a> {
    pub campaign_id: Uuid,
    pub household_id: Uuid,
    pub expected_amount: i64,
    pub paid_amount: i64,
    pub status: PaymentStatus,
    pub note: Option<&'a str>,
}

/// Insert or overwrite the payment row for (campaign, household).
/// `paid_at` is stamped the first time money arrives.
pub async fn upsert_payment(
    conn: &mut PgConnection,
    p: &PaymentFields<'_>,
) -> anyhow::Result<CampaignPayment> {
    let row = sqlx::query_as::<_, CampaignPayment>(&format!(
        r#"
        INSERT INTO campaign_payments AS cp
            (campaign_id, household_id, expected_amount, paid_amount, status, paid_at, note)
        VALUES ($1, $2, $3, $4, $5, CASE WHEN $4 > 0 THEN now() END, $6)
        ON CONFLICT (campaign_id, household_id) DO UPDATE
           SET expected_amount = EXCLUDED.expected_amount,
               paid_amount     = EXCLUDED.paid_amount,
               status          = EXCLUDED.status,
               paid_at         = CASE WHEN EXCLUDED.paid_amount > cp.paid_amount THEN now()
                                      ELSE cp.paid_at END,
               note            = COALESCE(EXCLUDED.note, cp.note),
               updated_at      = now()
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(p.campaign_id)
    .bind(p.household_id)
    .bind(p.expected_amount)
    .bind(p.paid_amount)
    .bind(p.status)
    .bind(p.note)
    .fetch_one(&mut *conn)
    .await
    .context("upsert payment")?;
    Ok(row)
}

pub async fn list_payments(
    db: &PgPool,
    campaign_id: Uuid,
    status: Option<PaymentStatus>,
    page: Page,
) -> anyhow::Result<(Vec<PaymentRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        r#"
        SELECT {PAYMENT_COLUMNS}, h.household_number, h.address
          FROM campaign_payments cp
          JOIN households h ON h.id = cp.household_id
         WHERE cp.campaign_id = "#
    ));
    qb.push_bind(campaign_id);
    if let Some(s) = status {
        qb.push(" AND cp.status = ").push_bind(s);
    }
    qb.push(" ORDER BY h.household_number LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb
        .build_query_as::<PaymentRow>()
        .fetch_all(db)
        .await
        .context("list payments")?;

    let mut count =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM campaign_payments cp WHERE cp.campaign_id = ");
    count.push_bind(campaign_id);
    if let Some(s) = status {
        count.push(" AND cp.status = ").push_bind(s);
    }
    let (total,): (i64,) = count
        .build_query_as()
        .fetch_one(db)
        .await
        .context("count payments")?;

    Ok((rows, total))
}

/// (campaign type, expected total, collected total) across all campaigns.
pub async fn totals_by_type(db: &PgPool) -> anyhow::Result<Vec<(CampaignType, i64, i64)>> {
    let rows = sqlx::query_as::<_, (CampaignType, i64, i64)>(
        r#"
        SELECT c.campaign_type,
               COALESCE(SUM(cp.expected_amount), 0)::BIGINT,
               COALESCE(SUM(cp.paid_amount), 0)::BIGINT
          FROM campaigns c
          LEFT JOIN campaign_payments cp ON cp.campaign_id = c.id
         GROUP BY c.campaign_type
        "#,
    )
    .fetch_all(db)
    .await
    .context("campaign totals")?;
    Ok(rows)
}
