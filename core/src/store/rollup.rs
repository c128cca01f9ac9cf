//! Rollup table access — the four derived tables owned by this subsystem.
//!
//! Counter updates are expressed as in-SQL `x = x + ?` / `MAX(0, x - ?)`
//! so concurrent settlements in the same month cannot lose updates, and
//! membership inserts use `INSERT OR IGNORE` against the composite primary
//! key so "count once per month" stays race-safe.

use super::{date_from_sql, date_to_sql, EventRollupRow, MonthlyRollupRow, RollupStore};
use crate::derive::{Channel, DonorCategory};
use crate::error::RollupResult;
use crate::types::Month;
use rusqlite::{params, Row};

fn map_monthly_row(row: &Row<'_>) -> rusqlite::Result<(String, MonthlyRollupRow)> {
    let month: String = row.get(0)?;
    let parsed = MonthlyRollupRow {
        month: Default::default(), // filled by caller after date parse
        total_raised: row.get(1)?,
        individual_raised: row.get(2)?,
        organization_raised: row.get(3)?,
        online_raised: row.get(4)?,
        phone_raised: row.get(5)?,
        event_raised: row.get(6)?,
        corporate_raised: row.get(7)?,
        donation_count: row.get(8)?,
        donor_count: row.get(9)?,
        offline_amount: row.get(10)?,
        offline_count: row.get(11)?,
    };
    Ok((month, parsed))
}

const MONTHLY_COLUMNS: &str = "month, total_raised, individual_raised, organization_raised,
        online_raised, phone_raised, event_raised, corporate_raised,
        donation_count, donor_count, offline_amount, offline_count";

impl RollupStore {
    // ── Incremental path ───────────────────────────────────────

    /// Lazily create the monthly row with all-zero counters.
    pub fn ensure_monthly_row(&self, month: Month) -> RollupResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO monthly_rollup (month) VALUES (?1)",
            params![date_to_sql(month)],
        )?;
        Ok(())
    }

    /// Atomically add a settled donation to the month's counters.
    pub fn add_settled_to_month(
        &self,
        month: Month,
        amount: f64,
        category: DonorCategory,
        channel: Channel,
    ) -> RollupResult<()> {
        // Column names come from the two derivation enums, never from input.
        let sql = format!(
            "UPDATE monthly_rollup SET
                total_raised = total_raised + ?1,
                {cat} = {cat} + ?1,
                {chan} = {chan} + ?1,
                donation_count = donation_count + 1
             WHERE month = ?2",
            cat = category.column(),
            chan = channel.column(),
        );
        self.conn.execute(&sql, params![amount, date_to_sql(month)])?;
        Ok(())
    }

    /// Atomically remove a reversed donation from the month's counters,
    /// clamping every field at zero. Does NOT touch donor_count: that
    /// correction is deferred to the nightly rebuild.
    pub fn subtract_reversed_from_month(
        &self,
        month: Month,
        amount: f64,
        category: DonorCategory,
        channel: Channel,
    ) -> RollupResult<()> {
        let sql = format!(
            "UPDATE monthly_rollup SET
                total_raised = MAX(0.0, total_raised - ?1),
                {cat} = MAX(0.0, {cat} - ?1),
                {chan} = MAX(0.0, {chan} - ?1),
                donation_count = MAX(0, donation_count - 1)
             WHERE month = ?2",
            cat = category.column(),
            chan = channel.column(),
        );
        self.conn.execute(&sql, params![amount, date_to_sql(month)])?;
        Ok(())
    }

    /// Insert-if-absent into the month/donor membership table. Returns
    /// true when the row was new, i.e. this contributor had not yet been
    /// counted for the month. A duplicate is a normal outcome, not an
    /// error.
    pub fn insert_month_donor(&self, month: Month, contributor_id: &str) -> RollupResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO month_donor (month, contributor_id) VALUES (?1, ?2)",
            params![date_to_sql(month), contributor_id],
        )?;
        Ok(changed == 1)
    }

    pub fn increment_donor_count(&self, month: Month) -> RollupResult<()> {
        self.conn.execute(
            "UPDATE monthly_rollup SET donor_count = donor_count + 1 WHERE month = ?1",
            params![date_to_sql(month)],
        )?;
        Ok(())
    }

    /// Insert-if-absent into the month/event membership table.
    pub fn insert_month_event(&self, month: Month, event_id: &str) -> RollupResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO month_event (month, event_id) VALUES (?1, ?2)",
            params![date_to_sql(month), event_id],
        )?;
        Ok(changed == 1)
    }

    /// Lazily create the per-event row for (event, month).
    pub fn ensure_event_row(&self, event_id: &str, month: Month) -> RollupResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO event_rollup (event_id, month) VALUES (?1, ?2)",
            params![event_id, date_to_sql(month)],
        )?;
        Ok(())
    }

    pub fn add_settled_to_event(
        &self,
        event_id: &str,
        month: Month,
        amount: f64,
    ) -> RollupResult<()> {
        self.conn.execute(
            "UPDATE event_rollup SET
                amount_raised = amount_raised + ?1,
                donation_count = donation_count + 1
             WHERE event_id = ?2 AND month = ?3",
            params![amount, event_id, date_to_sql(month)],
        )?;
        Ok(())
    }

    pub fn subtract_reversed_from_event(
        &self,
        event_id: &str,
        month: Month,
        amount: f64,
    ) -> RollupResult<()> {
        self.conn.execute(
            "UPDATE event_rollup SET
                amount_raised = MAX(0.0, amount_raised - ?1),
                donation_count = MAX(0, donation_count - 1)
             WHERE event_id = ?2 AND month = ?3",
            params![amount, event_id, date_to_sql(month)],
        )?;
        Ok(())
    }

    // ── Rebuild path ───────────────────────────────────────────

    /// Delete one month's rows from all four rollup tables.
    pub fn delete_month(&self, month: Month) -> RollupResult<()> {
        let m = date_to_sql(month);
        self.conn
            .execute("DELETE FROM monthly_rollup WHERE month = ?1", params![m])?;
        self.conn
            .execute("DELETE FROM event_rollup WHERE month = ?1", params![m])?;
        self.conn
            .execute("DELETE FROM month_donor WHERE month = ?1", params![m])?;
        self.conn
            .execute("DELETE FROM month_event WHERE month = ?1", params![m])?;
        Ok(())
    }

    /// Wipe all four rollup tables. Full rebuild only.
    pub fn truncate_rollups(&self) -> RollupResult<()> {
        self.conn.execute_batch(
            "DELETE FROM monthly_rollup;
             DELETE FROM event_rollup;
             DELETE FROM month_donor;
             DELETE FROM month_event;",
        )?;
        Ok(())
    }

    /// Insert a fully computed monthly row (rebuild bulk path).
    pub fn insert_monthly_rollup(&self, row: &MonthlyRollupRow) -> RollupResult<()> {
        self.conn.execute(
            "INSERT INTO monthly_rollup (
                month, total_raised, individual_raised, organization_raised,
                online_raised, phone_raised, event_raised, corporate_raised,
                donation_count, donor_count, offline_amount, offline_count
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                date_to_sql(row.month),
                row.total_raised,
                row.individual_raised,
                row.organization_raised,
                row.online_raised,
                row.phone_raised,
                row.event_raised,
                row.corporate_raised,
                row.donation_count,
                row.donor_count,
                row.offline_amount,
                row.offline_count,
            ],
        )?;
        Ok(())
    }

    pub fn insert_event_rollup(&self, row: &EventRollupRow) -> RollupResult<()> {
        self.conn.execute(
            "INSERT INTO event_rollup (event_id, month, amount_raised, donation_count, donor_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.event_id,
                date_to_sql(row.month),
                row.amount_raised,
                row.donation_count,
                row.donor_count,
            ],
        )?;
        Ok(())
    }

    /// Upsert the offline-ledger figures for a month. These two counters
    /// are never touched by the incremental applier.
    pub fn merge_offline_totals(&self, month: Month, amount: f64, count: i64) -> RollupResult<()> {
        self.conn.execute(
            "INSERT INTO monthly_rollup (month, offline_amount, offline_count)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(month) DO UPDATE SET
                offline_amount = excluded.offline_amount,
                offline_count = excluded.offline_count",
            params![date_to_sql(month), amount, count],
        )?;
        Ok(())
    }

    // ── Read queries served to the dashboard layer ─────────────

    pub fn monthly_rollup(&self, month: Month) -> RollupResult<Option<MonthlyRollupRow>> {
        let sql = format!("SELECT {MONTHLY_COLUMNS} FROM monthly_rollup WHERE month = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![date_to_sql(month)], map_monthly_row)?;
        match rows.next() {
            Some(row) => {
                let (month_str, mut parsed) = row?;
                parsed.month = date_from_sql(&month_str)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Monthly rows with month in `[start, end_exclusive)`, ascending.
    pub fn monthly_rollups_between(
        &self,
        start: Month,
        end_exclusive: Month,
    ) -> RollupResult<Vec<MonthlyRollupRow>> {
        let sql = format!(
            "SELECT {MONTHLY_COLUMNS} FROM monthly_rollup
             WHERE month >= ?1 AND month < ?2
             ORDER BY month ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![date_to_sql(start), date_to_sql(end_exclusive)],
                map_monthly_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(month_str, mut parsed)| {
                parsed.month = date_from_sql(&month_str)?;
                Ok(parsed)
            })
            .collect()
    }

    /// All monthly rows for a calendar year, ascending.
    pub fn monthly_rollups_for_year(&self, year: i32) -> RollupResult<Vec<MonthlyRollupRow>> {
        let start = chrono::NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap();
        self.monthly_rollups_between(start, end)
    }

    pub fn event_rollup(&self, event_id: &str, month: Month) -> RollupResult<Option<EventRollupRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, month, amount_raised, donation_count, donor_count
             FROM event_rollup WHERE event_id = ?1 AND month = ?2",
        )?;
        let mut rows = stmt.query_map(params![event_id, date_to_sql(month)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        match rows.next() {
            Some(row) => {
                let (event_id, month_str, amount_raised, donation_count, donor_count) = row?;
                Ok(Some(EventRollupRow {
                    event_id,
                    month: date_from_sql(&month_str)?,
                    amount_raised,
                    donation_count,
                    donor_count,
                }))
            }
            None => Ok(None),
        }
    }

    /// Per-event totals for a given month, largest first.
    pub fn event_rollups_for_month(&self, month: Month) -> RollupResult<Vec<EventRollupRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, month, amount_raised, donation_count, donor_count
             FROM event_rollup WHERE month = ?1
             ORDER BY amount_raised DESC, event_id ASC",
        )?;
        let rows = stmt
            .query_map(params![date_to_sql(month)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(event_id, month_str, amount_raised, donation_count, donor_count)| {
                Ok(EventRollupRow {
                    event_id,
                    month: date_from_sql(&month_str)?,
                    amount_raised,
                    donation_count,
                    donor_count,
                })
            })
            .collect()
    }

    // ── Membership helpers (tests and diagnostics) ─────────────

    pub fn month_donor_membership_count(&self, month: Month) -> RollupResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM month_donor WHERE month = ?1",
                params![date_to_sql(month)],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn month_event_membership_count(&self, month: Month) -> RollupResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM month_event WHERE month = ?1",
                params![date_to_sql(month)],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
