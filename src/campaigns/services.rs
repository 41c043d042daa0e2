use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CreateCampaignRequest, RecordPaymentRequest, UpdateCampaignRequest};
use super::repo::{self, CampaignFields, PaymentFields};
use super::repo_types::{derive_payment_status, Campaign, CampaignPayment};
use crate::dates::today;
use crate::error::AppError;
use crate::households::repo as households;

pub async fn create_campaign(db: &PgPool, req: &CreateCampaignRequest) -> Result<Campaign, AppError> {
    let campaign = repo::insert(
        db,
        &CampaignFields {
            name: &req.name,
            campaign_type: req.campaign_type,
            amount_per_person: req.amount_per_person,
            start_date: req.start_date,
            end_date: req.end_date,
            description: req.description.as_deref(),
        },
    )
    .await?;
    info!(campaign_id = %campaign.id, kind = ?campaign.campaign_type, "campaign created");
    Ok(campaign)
}

pub async fn update_campaign(
    db: &PgPool,
    id: Uuid,
    req: &mut UpdateCampaignRequest,
) -> Result<Campaign, AppError> {
    let mut tx = db.begin().await?;
    let old = repo::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Campaign"))?;
    req.validate(old.campaign_type, old.amount_per_person, old.start_date, old.end_date)?;

    let description = match &req.description {
        Some(d) => Some(d.trim()).filter(|d| !d.is_empty()),
        None => old.description.as_deref(),
    };
    let updated = repo::update(
        &mut tx,
        id,
        &CampaignFields {
            name: req.name.as_deref().unwrap_or(&old.name),
            campaign_type: old.campaign_type,
            amount_per_person: req.amount_per_person.or(old.amount_per_person),
            start_date: req.start_date.unwrap_or(old.start_date),
            end_date: req.end_date.unwrap_or(old.end_date),
            description,
        },
    )
    .await?;
    tx.commit().await?;
    info!(campaign_id = %id, "campaign updated");
    Ok(updated)
}

/// Campaigns that already hold money are kept for the books.
pub async fn delete_campaign(db: &PgPool, id: Uuid) -> Result<(), AppError> {
    let mut tx = db.begin().await?;
    repo::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Campaign"))?;
    let collected = repo::collected_amount(&mut tx, id).await?;
    if collected > 0 {
        return Err(AppError::Conflict(
            "Campaign has recorded payments and cannot be deleted".into(),
        ));
    }
    repo::delete(&mut tx, id).await?;
    tx.commit().await?;
    info!(campaign_id = %id, "campaign deleted");
    Ok(())
}

/// Add a household payment, recomputing expectation and status.
pub async fn record_payment(
    db: &PgPool,
    campaign_id: Uuid,
    req: &RecordPaymentRequest,
) -> Result<CampaignPayment, AppError> {
    let mut tx = db.begin().await?;
    let campaign = repo::lock(&mut tx, campaign_id)
        .await?
        .ok_or_else(|| AppError::not_found("Campaign"))?;
    households::lock_household(&mut tx, req.household_id)
        .await?
        .ok_or_else(|| AppError::not_found("Household"))?;

    let on = today();
    if on < campaign.start_date || on > campaign.end_date {
        warn!(%campaign_id, %on, "payment recorded outside campaign window");
    }

    let expected = match req.expected_amount {
        Some(e) => e,
        None => {
            let members = households::count_active_members(&mut tx, req.household_id, on).await?;
            campaign
                .expected_for(members)
                .ok_or_else(|| AppError::field("amount_per_person", "is too large"))?
        }
    };
    let previous = repo::lock_payment(&mut tx, campaign_id, req.household_id)
        .await?
        .map_or(0, |p| p.paid_amount);
    let paid = previous
        .checked_add(req.amount)
        .ok_or_else(|| AppError::field("amount", "is too large"))?;
    let status = derive_payment_status(expected, paid);

    let payment = repo::upsert_payment(
        &mut tx,
        &PaymentFields {
            campaign_id,
            household_id: req.household_id,
            expected_amount: expected,
            paid_amount: paid,
            status,
            note: req.note.as_deref(),
        },
    )
    .await?;
    tx.commit().await?;
    info!(%campaign_id, household_id = %req.household_id, paid, expected, ?status, "payment recorded");
    Ok(payment)
}
