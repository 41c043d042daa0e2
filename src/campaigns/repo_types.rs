use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "campaign_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignType {
    /// Fee collection; every household owes per-person amounts.
    Mandatory,
    /// Donation drive.
    Voluntary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Partial,
}

/// Status implied by the amounts. A zero expectation means any positive payment settles it.
pub fn derive_payment_status(expected: i64, paid: i64) -> PaymentStatus {
    if paid <= 0 {
        PaymentStatus::Pending
    } else if expected <= 0 || paid >= expected {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub campaign_type: CampaignType,
    pub amount_per_person: Option<i64>,
    pub start_date: Date,
    pub end_date: Date,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Campaign {
    /// What a household of `members` people owes, or `None` on overflow.
    /// Donations carry no expectation.
    pub fn expected_for(&self, members: i64) -> Option<i64> {
        match self.campaign_type {
            CampaignType::Mandatory => self.amount_per_person.unwrap_or(0).checked_mul(members),
            CampaignType::Voluntary => Some(0),
        }
    }
}

/// Campaign with collection totals.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CampaignSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub campaign: Campaign,
    pub expected_total: i64,
    pub collected_total: i64,
    pub paid_households: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CampaignPayment {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub household_id: Uuid,
    pub expected_amount: i64,
    pub paid_amount: i64,
    pub status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Payment joined with its household for list pages.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: CampaignPayment,
    pub household_number: String,
    pub address: String,
}
