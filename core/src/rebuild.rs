//! Rebuild engine — recomputes rollups from raw records.
//!
//! The rebuild is the ground truth the incremental applier approximates:
//! it derives every dimension through the same `derive` functions, then
//! deletes and recreates whole months. Re-running it over an unchanged
//! record set produces identical rows, so a failed run is retried simply
//! by running again.
//!
//! Each month's delete+reinsert is one transaction. A reader querying
//! mid-rebuild may transiently see a month with no row; absence reads as
//! zero by convention of the query layer.

use crate::config::RollupConfig;
use crate::derive::{self, Channel, DonorCategory};
use crate::error::RollupResult;
use crate::store::{EventRollupRow, MonthlyRollupRow, RollupStore};
use crate::types::{ContributorId, EventId, Month};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of one rebuild run, for the caller's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    pub months_in_window: u32,
    pub months_with_activity: u32,
    pub records_scanned: u64,
}

#[derive(Default)]
struct EventAccumulator {
    amount: f64,
    count: i64,
    donors: BTreeSet<ContributorId>,
}

#[derive(Default)]
struct MonthAccumulator {
    total: f64,
    individual: f64,
    organization: f64,
    online: f64,
    phone: f64,
    event: f64,
    corporate: f64,
    count: i64,
    donors: BTreeSet<ContributorId>,
    events: BTreeMap<EventId, EventAccumulator>,
}

pub struct RebuildEngine<'a> {
    store: &'a RollupStore,
    config: RollupConfig,
}

impl<'a> RebuildEngine<'a> {
    pub fn new(store: &'a RollupStore, config: RollupConfig) -> Self {
        Self { store, config }
    }

    /// Recompute the trailing window of months from raw records,
    /// overwriting whatever the incremental applier produced for it.
    /// Idempotent; the nightly scheduler calls this.
    pub fn windowed_rebuild(&self, now: DateTime<Utc>) -> RollupResult<RebuildSummary> {
        let current = derive::month_start(now.date_naive());
        let start = derive::months_back(current, self.config.window_months);
        let end_exclusive = derive::next_month(current);
        let summary = self.rebuild_range(start, end_exclusive)?;
        log::info!(
            "windowed rebuild: {start}..{end_exclusive}, {} months active, {} records",
            summary.months_with_activity,
            summary.records_scanned
        );
        Ok(summary)
    }

    /// Recompute everything from empty state over the long lookback and
    /// merge in the offline ledger. Manual/administrative invocation only.
    pub fn full_rebuild(&self, now: DateTime<Utc>) -> RollupResult<RebuildSummary> {
        let current = derive::month_start(now.date_naive());
        let start = derive::months_back(current, self.config.full_lookback_months);
        let end_exclusive = derive::next_month(current);

        self.store.truncate_rollups()?;
        let summary = self.rebuild_range(start, end_exclusive)?;

        // Offline figures live only here; the applier never writes them.
        for (month, amount, count) in self.store.offline_totals_by_month(start, end_exclusive)? {
            self.store.merge_offline_totals(month, amount, count)?;
        }

        log::info!(
            "full rebuild: {start}..{end_exclusive}, {} months active, {} records",
            summary.months_with_activity,
            summary.records_scanned
        );
        Ok(summary)
    }

    /// Shared delete-then-recompute-then-insert over `[start, end)`.
    fn rebuild_range(&self, start: Month, end_exclusive: Month) -> RollupResult<RebuildSummary> {
        let records = self.store.settled_donations_between(start, end_exclusive)?;
        let records_scanned = records.len() as u64;

        let mut months: BTreeMap<Month, MonthAccumulator> = BTreeMap::new();
        for (donation, contributor) in &records {
            let amount = derive::effective_amount(donation);
            let month = derive::month_start(derive::effective_date(donation));
            let channel = derive::channel(donation, contributor.as_ref());
            let category = derive::donor_category(contributor.as_ref());

            let acc = months.entry(month).or_default();
            acc.total += amount;
            acc.count += 1;
            match category {
                DonorCategory::Individual => acc.individual += amount,
                DonorCategory::Organization => acc.organization += amount,
            }
            match channel {
                Channel::Online => acc.online += amount,
                Channel::Phone => acc.phone += amount,
                Channel::Event => acc.event += amount,
                Channel::Corporate => acc.corporate += amount,
            }
            if let Some(contributor_id) = &donation.contributor_id {
                acc.donors.insert(contributor_id.clone());
            }
            if let Some(event_id) = &donation.event_id {
                let ev = acc.events.entry(event_id.clone()).or_default();
                ev.amount += amount;
                ev.count += 1;
                if let Some(contributor_id) = &donation.contributor_id {
                    ev.donors.insert(contributor_id.clone());
                }
            }
        }

        // Every month in the window is deleted, including months with no
        // activity, so stale applier output cannot survive a rebuild.
        let mut months_in_window = 0;
        let mut months_with_activity = 0;
        let mut month = start;
        while month < end_exclusive {
            months_in_window += 1;
            let tx = self.store.begin()?;
            self.store.delete_month(month)?;
            if let Some(acc) = months.get(&month) {
                months_with_activity += 1;
                self.persist_month(month, acc)?;
            }
            tx.commit()?;
            month = derive::next_month(month);
        }

        Ok(RebuildSummary {
            months_in_window,
            months_with_activity,
            records_scanned,
        })
    }

    fn persist_month(&self, month: Month, acc: &MonthAccumulator) -> RollupResult<()> {
        let row = MonthlyRollupRow {
            total_raised: acc.total,
            individual_raised: acc.individual,
            organization_raised: acc.organization,
            online_raised: acc.online,
            phone_raised: acc.phone,
            event_raised: acc.event,
            corporate_raised: acc.corporate,
            donation_count: acc.count,
            donor_count: acc.donors.len() as i64,
            ..MonthlyRollupRow::empty(month)
        };
        self.store.insert_monthly_rollup(&row)?;

        for contributor_id in &acc.donors {
            self.store.insert_month_donor(month, contributor_id)?;
        }

        for (event_id, ev) in &acc.events {
            self.store.insert_event_rollup(&EventRollupRow {
                event_id: event_id.clone(),
                month,
                amount_raised: ev.amount,
                donation_count: ev.count,
                donor_count: ev.donors.len() as i64,
            })?;
            self.store.insert_month_event(month, event_id)?;
        }

        Ok(())
    }
}
