use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::campaigns::{repo as campaigns, CampaignType};
use crate::dates::today;
use crate::error::AppError;
use crate::households::repo as households;
use crate::persons::{repo as persons, Gender, ResidencyStatus};
use crate::temp_residence::{repo as temp_residences, TempResidenceKind};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AgeBreakdown {
    pub child: i64,
    pub adult: i64,
    pub senior: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionTotals {
    pub expected: i64,
    pub collected: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    /// Residents still living in the ward.
    pub total_residents: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub by_gender: BTreeMap<&'static str, i64>,
    pub by_age: AgeBreakdown,
    pub households: i64,
    pub temporary_stays: i64,
    pub temporary_absences: i64,
    pub fees: CollectionTotals,
    pub donations: CollectionTotals,
}

fn status_key(s: ResidencyStatus) -> &'static str {
    match s {
        ResidencyStatus::Permanent => "permanent",
        ResidencyStatus::TemporaryResident => "temporary_resident",
        ResidencyStatus::TemporaryAbsent => "temporary_absent",
        ResidencyStatus::MovedOut => "moved_out",
        ResidencyStatus::Deceased => "deceased",
    }
}

fn gender_key(g: Gender) -> &'static str {
    match g {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Other => "other",
    }
}

impl Dashboard {
    /// Fold grouped counts into the dashboard; missing groups read as zero.
    pub fn assemble(
        by_status: &[(ResidencyStatus, i64)],
        by_gender: &[(Gender, i64)],
        by_age: (i64, i64, i64),
        households: i64,
        temp: &[(TempResidenceKind, i64)],
        money: &[(CampaignType, i64, i64)],
    ) -> Self {
        let mut d = Dashboard {
            households,
            by_age: AgeBreakdown {
                child: by_age.0,
                adult: by_age.1,
                senior: by_age.2,
            },
            ..Default::default()
        };
        for s in [
            ResidencyStatus::Permanent,
            ResidencyStatus::TemporaryResident,
            ResidencyStatus::TemporaryAbsent,
            ResidencyStatus::MovedOut,
            ResidencyStatus::Deceased,
        ] {
            d.by_status.insert(status_key(s), 0);
        }
        for (s, n) in by_status {
            d.by_status.insert(status_key(*s), *n);
            if s.is_present() {
                d.total_residents += n;
            }
        }
        for g in [Gender::Male, Gender::Female, Gender::Other] {
            d.by_gender.insert(gender_key(g), 0);
        }
        for (g, n) in by_gender {
            d.by_gender.insert(gender_key(*g), *n);
        }
        for (kind, n) in temp {
            match kind {
                TempResidenceKind::TemporaryStay => d.temporary_stays = *n,
                TempResidenceKind::TemporaryAbsence => d.temporary_absences = *n,
            }
        }
        for (kind, expected, collected) in money {
            let slot = match kind {
                CampaignType::Mandatory => &mut d.fees,
                CampaignType::Voluntary => &mut d.donations,
            };
            slot.expected += expected;
            slot.collected += collected;
        }
        d
    }
}

pub async fn dashboard(db: &PgPool) -> Result<Dashboard, AppError> {
    let by_status = persons::count_by_status(db).await?;
    let by_gender = persons::count_present_by_gender(db).await?;
    let by_age = persons::count_present_by_age(db, today()).await?;
    let household_count = households::count_households(db).await?;
    let temp = temp_residences::count_active(db).await?;
    let money = campaigns::totals_by_type(db).await?;
    Ok(Dashboard::assemble(
        &by_status,
        &by_gender,
        by_age,
        household_count,
        &temp,
        &money,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_fills_missing_groups_and_counts_present_residents() {
        let d = Dashboard::assemble(
            &[
                (ResidencyStatus::Permanent, 120),
                (ResidencyStatus::TemporaryAbsent, 5),
                (ResidencyStatus::Deceased, 3),
            ],
            &[(Gender::Female, 64), (Gender::Male, 61)],
            (30, 80, 15),
            40,
            &[(TempResidenceKind::TemporaryAbsence, 5)],
            &[
                (CampaignType::Mandatory, 1_000_000, 750_000),
                (CampaignType::Voluntary, 0, 2_300_000),
            ],
        );
        assert_eq!(d.total_residents, 125);
        assert_eq!(d.by_status["temporary_resident"], 0);
        assert_eq!(d.by_status["deceased"], 3);
        assert_eq!(d.by_gender["other"], 0);
        assert_eq!(d.by_age.adult, 80);
        assert_eq!(d.temporary_stays, 0);
        assert_eq!(d.temporary_absences, 5);
        assert_eq!(d.fees, CollectionTotals { expected: 1_000_000, collected: 750_000 });
        assert_eq!(d.donations.collected, 2_300_000);
    }
}
