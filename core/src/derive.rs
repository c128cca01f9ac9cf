//! Derivation rules shared by the incremental applier and the rebuild
//! engine.
//!
//! RULE: Both update paths call these functions — neither re-implements
//! the logic inline. Any divergence between the paths is the drift this
//! subsystem exists to bound, so the rules live here and nowhere else.

use crate::record::{ContributorRecord, DonationRecord};
use crate::types::Month;
use chrono::{Datelike, NaiveDate};

/// Contribution channel. Categorical and mutually exclusive: the first
/// matching rule in [`channel`] wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Online,
    Phone,
    Event,
    Corporate,
}

impl Channel {
    /// Column of `monthly_rollup` this channel accumulates into.
    pub fn column(&self) -> &'static str {
        match self {
            Channel::Online => "online_raised",
            Channel::Phone => "phone_raised",
            Channel::Event => "event_raised",
            Channel::Corporate => "corporate_raised",
        }
    }
}

/// Contributor category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonorCategory {
    Individual,
    Organization,
}

impl DonorCategory {
    /// Column of `monthly_rollup` this category accumulates into.
    pub fn column(&self) -> &'static str {
        match self {
            DonorCategory::Individual => "individual_raised",
            DonorCategory::Organization => "organization_raised",
        }
    }
}

/// Truncate a date to the first of its month.
pub fn month_start(date: NaiveDate) -> Month {
    // day 1 always exists
    date.with_day(1).unwrap()
}

/// First-of-month `n` months before `month`.
pub fn months_back(month: Month, n: u32) -> Month {
    let total = month.year() * 12 + month.month0() as i32 - n as i32;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap()
}

/// First-of-month immediately after `month`.
pub fn next_month(month: Month) -> Month {
    let (year, m) = if month.month() == 12 {
        (month.year() + 1, 1)
    } else {
        (month.year(), month.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, m, 1).unwrap()
}

/// Effective monetary amount of a donation: the collected amount if
/// positive, else the nominal amount, else zero.
pub fn effective_amount(rec: &DonationRecord) -> f64 {
    match rec.amount_collected {
        Some(c) if c > 0.0 => c,
        _ => rec.amount.unwrap_or(0.0),
    }
}

/// Effective business date: the recorded gift date, falling back to the
/// creation timestamp's UTC date.
pub fn effective_date(rec: &DonationRecord) -> NaiveDate {
    rec.gift_date.unwrap_or_else(|| rec.created_at.date_naive())
}

fn is_organization(contributor: Option<&ContributorRecord>) -> bool {
    contributor
        .and_then(|c| c.category.as_deref())
        .map_or(false, |cat| cat.eq_ignore_ascii_case("organization"))
}

fn tag_mentions_phone(tag: Option<&str>) -> bool {
    tag.map_or(false, |t| t.to_ascii_lowercase().contains("phone"))
}

/// Derive the channel of a donation. Precedence:
/// event-linked > corporate contributor > phone tag > online.
pub fn channel(rec: &DonationRecord, contributor: Option<&ContributorRecord>) -> Channel {
    if rec.event_id.is_some() {
        Channel::Event
    } else if is_organization(contributor) {
        Channel::Corporate
    } else if tag_mentions_phone(rec.payment_method.as_deref())
        || tag_mentions_phone(rec.source.as_deref())
    {
        Channel::Phone
    } else {
        Channel::Online
    }
}

/// Derive the contributor category. Donations with no linked contributor
/// count as individual.
pub fn donor_category(contributor: Option<&ContributorRecord>) -> DonorCategory {
    if is_organization(contributor) {
        DonorCategory::Organization
    } else {
        DonorCategory::Individual
    }
}
