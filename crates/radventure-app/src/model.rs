// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    XRay,
    Ct,
    Mri,
    Ultrasound,
    Nuclear,
    Fluoroscopy,
    Mammography,
}

impl Modality {
    pub const ALL: [Self; 7] = [
        Self::XRay,
        Self::Ct,
        Self::Mri,
        Self::Ultrasound,
        Self::Nuclear,
        Self::Fluoroscopy,
        Self::Mammography,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XRay => "x_ray",
            Self::Ct => "ct",
            Self::Mri => "mri",
            Self::Ultrasound => "ultrasound",
            Self::Nuclear => "nuclear",
            Self::Fluoroscopy => "fluoroscopy",
            Self::Mammography => "mammography",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "x_ray" => Some(Self::XRay),
            "ct" => Some(Self::Ct),
            "mri" => Some(Self::Mri),
            "ultrasound" => Some(Self::Ultrasound),
            "nuclear" => Some(Self::Nuclear),
            "fluoroscopy" => Some(Self::Fluoroscopy),
            "mammography" => Some(Self::Mammography),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::XRay => "X-Ray",
            Self::Ct => "CT",
            Self::Mri => "MRI",
            Self::Ultrasound => "Ultrasound",
            Self::Nuclear => "Nuclear Medicine",
            Self::Fluoroscopy => "Fluoroscopy",
            Self::Mammography => "Mammography",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Purchase,
    CaseReward,
    EventPrize,
    AdminAdjustment,
}

impl TxType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::CaseReward => "case_reward",
            Self::EventPrize => "event_prize",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "purchase" => Some(Self::Purchase),
            "case_reward" => Some(Self::CaseReward),
            "event_prize" => Some(Self::EventPrize),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Active,
    Ended,
}

impl EventStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub full_name: String,
    pub email: String,
    pub radcoin_balance: i64,
    pub total_points: i64,
    pub institution: String,
    pub academic_stage: String,
    pub specialty_interest: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalCase {
    pub id: CaseId,
    pub title: String,
    pub specialty: String,
    pub modality: Modality,
    pub difficulty_level: i32,
    pub description: String,
    pub answer_options: Vec<String>,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub tags: Vec<String>,
    pub points: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl MedicalCase {
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_answer_index
    }
}

/// Points a case is worth when the author leaves the field unset.
pub const fn default_case_points(difficulty_level: i32) -> i64 {
    (difficulty_level as i64) * 10
}

/// RadCoins credited for the first correct answer to a case.
pub const fn case_radcoin_reward(difficulty_level: i32) -> i64 {
    (difficulty_level as i64) * 5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub rank: u32,
    pub radcoins: i64,
}

/// Which catalog cases an event draws from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseFilters {
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub modalities: Vec<Modality>,
    #[serde(default)]
    pub min_difficulty: Option<i32>,
    #[serde(default)]
    pub max_difficulty: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub prize_pool: i64,
    pub prize_distribution: Vec<PrizeTier>,
    pub case_filters: CaseFilters,
    pub banner_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Event {
    pub fn status(&self, now: OffsetDateTime) -> EventStatus {
        if now < self.starts_at {
            EventStatus::Upcoming
        } else if now > self.ends_at {
            EventStatus::Ended
        } else {
            EventStatus::Active
        }
    }

    pub fn prize_for_rank(&self, rank: u32) -> Option<i64> {
        self.prize_distribution
            .iter()
            .find(|tier| tier.rank == rank)
            .map(|tier| tier.radcoins)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Benefits {
    pub elimination_aids: i64,
    pub skip_aids: i64,
    pub ai_tutor_credits: i64,
}

impl Benefits {
    pub const fn is_empty(&self) -> bool {
        self.elimination_aids == 0 && self.skip_aids == 0 && self.ai_tutor_credits == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadCoinProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: i64,
    pub benefits: Benefits,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialOffer {
    pub id: OfferId,
    pub product_id: ProductId,
    pub title: String,
    pub discount_percent: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub is_active: bool,
}

impl SpecialOffer {
    pub fn is_available(&self, now: OffsetDateTime) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }

    pub fn effective_price(&self, base_price: i64) -> i64 {
        let percent = self.discount_percent.clamp(0, 100);
        base_price - (base_price * percent) / 100
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLogRow {
    pub id: TransactionId,
    pub user_id: ProfileId,
    pub tx_type: TxType,
    pub amount: i64,
    pub balance_after: i64,
    pub metadata: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBenefits {
    pub user_id: ProfileId,
    pub benefits: Benefits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingState {
    pub user_id: ProfileId,
    pub onboarding_completed: bool,
    pub last_seen_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub offer_id: Option<OfferId>,
    pub price_paid: i64,
    pub balance_after: i64,
    pub benefits_granted: Benefits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points_awarded: i64,
    pub radcoins_awarded: i64,
    pub total_points: i64,
    pub balance_after: i64,
}

#[cfg(test)]
mod tests {
    use super::{Modality, SpecialOffer, TxType};
    use crate::{OfferId, ProductId};
    use time::macros::datetime;

    #[test]
    fn modality_strings_parse_back() {
        for modality in Modality::ALL {
            assert_eq!(Modality::parse(modality.as_str()), Some(modality));
        }
        assert_eq!(Modality::parse("pet"), None);
    }

    #[test]
    fn tx_type_rejects_unknown_values() {
        assert_eq!(TxType::parse("case_reward"), Some(TxType::CaseReward));
        assert_eq!(TxType::parse("refund"), None);
    }

    #[test]
    fn offer_availability_respects_window_and_flag() {
        let offer = SpecialOffer {
            id: OfferId::new(1),
            product_id: ProductId::new(1),
            title: "Weekend".to_owned(),
            discount_percent: 25,
            starts_at: datetime!(2026-03-01 00:00 UTC),
            ends_at: datetime!(2026-03-03 00:00 UTC),
            is_active: true,
        };
        assert!(offer.is_available(datetime!(2026-03-02 12:00 UTC)));
        assert!(!offer.is_available(datetime!(2026-03-04 00:00 UTC)));

        let disabled = SpecialOffer {
            is_active: false,
            ..offer.clone()
        };
        assert!(!disabled.is_available(datetime!(2026-03-02 12:00 UTC)));
        assert_eq!(offer.effective_price(150), 113);
    }
}
