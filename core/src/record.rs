//! Domain model of the raw rows the rollup subsystem reads.
//!
//! The donation and contributor tables belong to the donation-processing
//! side of the system; this crate treats them as read-only inputs.

use crate::types::{ContributorId, EventId, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a donation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Settled,
    Failed,
    Reversed,
    Refunded,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Settled => "settled",
            DonationStatus::Failed => "failed",
            DonationStatus::Reversed => "reversed",
            DonationStatus::Refunded => "refunded",
        }
    }

    /// Parse a stored status string. Unknown values map to `Pending` so a
    /// malformed row can never be mistaken for a settled one.
    pub fn parse(s: &str) -> Self {
        match s {
            "settled" => DonationStatus::Settled,
            "failed" => DonationStatus::Failed,
            "reversed" => DonationStatus::Reversed,
            "refunded" => DonationStatus::Refunded,
            _ => DonationStatus::Pending,
        }
    }

    /// True for either terminal reversal state.
    pub fn is_reversed(&self) -> bool {
        matches!(self, DonationStatus::Reversed | DonationStatus::Refunded)
    }
}

/// One monetary contribution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub donation_id: RecordId,
    pub contributor_id: Option<ContributorId>,
    pub event_id: Option<EventId>,
    /// Nominal pledge amount. Missing money is zero, never an error.
    pub amount: Option<f64>,
    /// Amount actually collected, when it differs from the pledge.
    pub amount_collected: Option<f64>,
    pub status: DonationStatus,
    /// Business date of the gift, when recorded.
    pub gift_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    /// Free-text tags used to derive the channel.
    pub payment_method: Option<String>,
    pub source: Option<String>,
}

/// The contributor linked to a donation, when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub contributor_id: ContributorId,
    pub name: String,
    /// 'individual' or 'organization'; anything else counts as individual.
    pub category: Option<String>,
}
