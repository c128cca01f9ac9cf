//! Raw donation table queries — the read side of the external record
//! store, plus the insert helpers used by the demo seeder and tests.

use super::{date_from_sql, date_to_sql, RollupStore};
use crate::error::RollupResult;
use crate::record::{ContributorRecord, DonationRecord, DonationStatus};
use crate::types::Month;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};

/// A donation joined with its contributor, as both update paths consume it.
pub type JoinedDonation = (DonationRecord, Option<ContributorRecord>);

fn map_joined_row(row: &Row<'_>) -> rusqlite::Result<JoinedDonation> {
    let gift_date: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let donation = DonationRecord {
        donation_id: row.get(0)?,
        contributor_id: row.get(1)?,
        event_id: row.get(2)?,
        amount: row.get(3)?,
        amount_collected: row.get(4)?,
        status: DonationStatus::parse(&row.get::<_, String>(5)?),
        gift_date: gift_date.and_then(|d| date_from_sql(&d).ok()),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        payment_method: row.get(8)?,
        source: row.get(9)?,
    };
    let contributor = match row.get::<_, Option<String>>(10)? {
        Some(contributor_id) => Some(ContributorRecord {
            contributor_id,
            name: row.get(11)?,
            category: row.get(12)?,
        }),
        None => None,
    };
    Ok((donation, contributor))
}

const JOINED_COLUMNS: &str = "d.donation_id, d.contributor_id, d.event_id, d.amount,
        d.amount_collected, d.status, d.gift_date, d.created_at,
        d.payment_method, d.source,
        c.contributor_id, c.name, c.category";

impl RollupStore {
    /// Fetch one donation with its linked contributor. The applier always
    /// re-fetches rather than trusting the caller's snapshot.
    pub fn fetch_donation(&self, donation_id: &str) -> RollupResult<Option<JoinedDonation>> {
        let sql = format!(
            "SELECT {JOINED_COLUMNS}
             FROM donation d
             LEFT JOIN contributor c ON c.contributor_id = d.contributor_id
             WHERE d.donation_id = ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![donation_id], map_joined_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All settled donations with effective date in `[start, end_exclusive)`,
    /// joined with their contributors. The SQL effective date mirrors
    /// `derive::effective_date`: gift date, else the created_at date.
    pub fn settled_donations_between(
        &self,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> RollupResult<Vec<JoinedDonation>> {
        let sql = format!(
            "SELECT {JOINED_COLUMNS}
             FROM donation d
             LEFT JOIN contributor c ON c.contributor_id = d.contributor_id
             WHERE d.status = 'settled'
               AND COALESCE(d.gift_date, substr(d.created_at, 1, 10)) >= ?1
               AND COALESCE(d.gift_date, substr(d.created_at, 1, 10)) < ?2
             ORDER BY d.donation_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![date_to_sql(start), date_to_sql(end_exclusive)],
                map_joined_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Per-month amount and count of verified/deposited offline gifts in
    /// `[start, end_exclusive)`. Only the full rebuild reads this ledger.
    pub fn offline_totals_by_month(
        &self,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> RollupResult<Vec<(Month, f64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT strftime('%Y-%m-01', received_date),
                    COALESCE(SUM(amount), 0.0),
                    COUNT(*)
             FROM offline_gift
             WHERE status IN ('verified', 'deposited')
               AND received_date >= ?1 AND received_date < ?2
             GROUP BY strftime('%Y-%m-01', received_date)
             ORDER BY 1",
        )?;
        let rows = stmt
            .query_map(params![date_to_sql(start), date_to_sql(end_exclusive)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(month, amount, count)| Ok((date_from_sql(&month)?, amount, count)))
            .collect()
    }

    // ── Seed helpers (demo tooling and tests) ──────────────────

    pub fn insert_contributor(&self, c: &ContributorRecord) -> RollupResult<()> {
        self.conn.execute(
            "INSERT INTO contributor (contributor_id, name, category) VALUES (?1, ?2, ?3)",
            params![c.contributor_id, c.name, c.category],
        )?;
        Ok(())
    }

    pub fn insert_donation(&self, d: &DonationRecord) -> RollupResult<()> {
        self.conn.execute(
            "INSERT INTO donation (
                donation_id, contributor_id, event_id, amount, amount_collected,
                status, gift_date, created_at, payment_method, source
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                d.donation_id,
                d.contributor_id,
                d.event_id,
                d.amount,
                d.amount_collected,
                d.status.as_str(),
                d.gift_date.map(date_to_sql),
                d.created_at.to_rfc3339(),
                d.payment_method,
                d.source,
            ],
        )?;
        Ok(())
    }

    pub fn set_donation_status(
        &self,
        donation_id: &str,
        status: DonationStatus,
    ) -> RollupResult<()> {
        self.conn.execute(
            "UPDATE donation SET status = ?1 WHERE donation_id = ?2",
            params![status.as_str(), donation_id],
        )?;
        Ok(())
    }

    pub fn set_donation_collected(
        &self,
        donation_id: &str,
        amount_collected: Option<f64>,
    ) -> RollupResult<()> {
        self.conn.execute(
            "UPDATE donation SET amount_collected = ?1 WHERE donation_id = ?2",
            params![amount_collected, donation_id],
        )?;
        Ok(())
    }

    pub fn insert_offline_gift(
        &self,
        gift_id: &str,
        amount: f64,
        status: &str,
        received_date: NaiveDate,
    ) -> RollupResult<()> {
        self.conn.execute(
            "INSERT INTO offline_gift (gift_id, amount, status, received_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![gift_id, amount, status, date_to_sql(received_date)],
        )?;
        Ok(())
    }
}
