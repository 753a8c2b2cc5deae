//! Records handed to the persistence sink, and the normalization helpers that
//! turn raw report values into display-ready ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// One advertising account found while walking the manager hierarchy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub customer_id: String,
    pub resource_name: String,
    /// Depth relative to the account whose query returned this row; 0 is the
    /// queried account itself.
    pub level: i64,
    pub is_manager: bool,
    pub manager_ids: Vec<String>,
    pub login_customer_id: String,
    pub currency: String,
    pub time_zone: String,
    pub name: String,
    pub owner_id: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CampaignStatus {
    Unspecified,
    Unknown,
    Enabled,
    Paused,
    Removed,
}

const STATUS_BY_CODE: [CampaignStatus; 5] = [
    CampaignStatus::Unspecified,
    CampaignStatus::Unknown,
    CampaignStatus::Enabled,
    CampaignStatus::Paused,
    CampaignStatus::Removed,
];

impl CampaignStatus {
    /// Decodes the numeric status; codes outside the table are `Unspecified`.
    pub fn from_code(code: i64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|idx| STATUS_BY_CODE.get(idx).copied())
            .unwrap_or(CampaignStatus::Unspecified)
    }

    pub fn from_name(name: &str) -> Self {
        STATUS_BY_CODE
            .iter()
            .copied()
            .find(|status| status.as_str() == name)
            .unwrap_or(CampaignStatus::Unspecified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Unspecified => "UNSPECIFIED",
            CampaignStatus::Unknown => "UNKNOWN",
            CampaignStatus::Enabled => "ENABLED",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Removed => "REMOVED",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBudgetRecord {
    pub budget_id: String,
    pub resource_name: String,
    /// Budget amount in major currency units despite the name.
    #[serde(rename = "amount_micros")]
    pub amount_micros: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetricsRecord {
    pub clicks: i64,
    pub impressions: i64,
    pub all_conversions: f64,
    #[serde(rename = "averageCPC")]
    pub average_cpc: f64,
    pub cost_micros: f64,
    pub x_days_average_cost: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRecord {
    pub campaign_id: String,
    pub customer_id: String,
    pub resource_name: String,
    pub name: String,
    pub status: CampaignStatus,
    pub campaign_budget: CampaignBudgetRecord,
    pub metrics: CampaignMetricsRecord,
    pub owner_id: String,
    pub first_imported_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Converts a micros amount into major currency units rounded to 2 decimals.
/// A missing amount counts as 0.
pub fn micros_to_units(micros: Option<f64>) -> f64 {
    let units = micros.unwrap_or(0.0) / MICROS_PER_UNIT;
    (units * 100.0).round() / 100.0
}
