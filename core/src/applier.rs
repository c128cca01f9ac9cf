//! Incremental applier — updates rollups synchronously as donations
//! reach a terminal state.
//!
//! Invoked once per state transition by the donation-processing path.
//! Each invocation re-fetches the record (stale-input guard), derives its
//! dimensions through `derive`, and applies all rollup mutations inside a
//! single transaction: either every counter moves or none does.
//!
//! Known staleness gap, by design: `apply_reversed` never decrements
//! `donor_count`. Deciding whether the contributor still has another
//! settled gift that month would cost an extra query per reversal, so the
//! correction is deferred to the nightly rebuild instead.

use crate::derive;
use crate::error::{RollupError, RollupResult};
use crate::record::DonationStatus;
use crate::store::RollupStore;

pub struct IncrementalApplier<'a> {
    store: &'a RollupStore,
}

impl<'a> IncrementalApplier<'a> {
    pub fn new(store: &'a RollupStore) -> Self {
        Self { store }
    }

    /// Apply a donation that has just settled.
    ///
    /// No-ops when the record's current status is not `settled`, which
    /// makes redelivery of the same transition notification safe.
    pub fn apply_settled(&self, donation_id: &str) -> RollupResult<()> {
        let (donation, contributor) = self
            .store
            .fetch_donation(donation_id)?
            .ok_or_else(|| RollupError::RecordNotFound {
                id: donation_id.to_string(),
            })?;

        if donation.status != DonationStatus::Settled {
            log::debug!(
                "apply_settled({donation_id}): status is {}, skipping",
                donation.status.as_str()
            );
            return Ok(());
        }

        let amount = derive::effective_amount(&donation);
        let month = derive::month_start(derive::effective_date(&donation));
        let channel = derive::channel(&donation, contributor.as_ref());
        let category = derive::donor_category(contributor.as_ref());

        let tx = self.store.begin()?;

        self.store.ensure_monthly_row(month)?;
        self.store
            .add_settled_to_month(month, amount, category, channel)?;

        // Count each contributor once per month. The membership insert is
        // the atomic "insert if absent" that makes this race-safe.
        if let Some(contributor_id) = &donation.contributor_id {
            if self.store.insert_month_donor(month, contributor_id)? {
                self.store.increment_donor_count(month)?;
            }
        }

        if let Some(event_id) = &donation.event_id {
            self.store.ensure_event_row(event_id, month)?;
            self.store.add_settled_to_event(event_id, month, amount)?;
            self.store.insert_month_event(month, event_id)?;
        }

        tx.commit()?;

        log::debug!(
            "apply_settled({donation_id}): month={month} amount={amount:.2} \
             channel={channel:?} category={category:?}"
        );
        Ok(())
    }

    /// Apply a donation that has just been reversed or refunded.
    ///
    /// Dimensions are re-derived from the record's *current* contributor
    /// and tags; if those were edited since settlement the decrement can
    /// land in a different bucket than the original increment. The rebuild
    /// masks this because it always derives from current state uniformly.
    pub fn apply_reversed(&self, donation_id: &str) -> RollupResult<()> {
        let (donation, contributor) = self
            .store
            .fetch_donation(donation_id)?
            .ok_or_else(|| RollupError::RecordNotFound {
                id: donation_id.to_string(),
            })?;

        if !donation.status.is_reversed() {
            log::debug!(
                "apply_reversed({donation_id}): status is {}, skipping",
                donation.status.as_str()
            );
            return Ok(());
        }

        let amount = derive::effective_amount(&donation);
        let month = derive::month_start(derive::effective_date(&donation));
        let channel = derive::channel(&donation, contributor.as_ref());
        let category = derive::donor_category(contributor.as_ref());

        let tx = self.store.begin()?;

        self.store
            .subtract_reversed_from_month(month, amount, category, channel)?;

        if let Some(event_id) = &donation.event_id {
            self.store
                .subtract_reversed_from_event(event_id, month, amount)?;
        }

        tx.commit()?;

        log::debug!(
            "apply_reversed({donation_id}): month={month} amount={amount:.2} \
             channel={channel:?} category={category:?}"
        );
        Ok(())
    }
}
