//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The applier, rebuild engine and scheduler call store methods — they
//! never execute SQL directly.

mod records;
mod rollup;

use crate::error::{RollupError, RollupResult};
use crate::types::{EventId, Month};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};

/// One row of `monthly_rollup`. The category breakdown and the channel
/// breakdown are independent partitions of `total_raised`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRollupRow {
    pub month: Month,
    pub total_raised: f64,
    pub individual_raised: f64,
    pub organization_raised: f64,
    pub online_raised: f64,
    pub phone_raised: f64,
    pub event_raised: f64,
    pub corporate_raised: f64,
    pub donation_count: i64,
    pub donor_count: i64,
    pub offline_amount: f64,
    pub offline_count: i64,
}

impl MonthlyRollupRow {
    /// An all-zero row for a month, used for lazy creation.
    pub fn empty(month: Month) -> Self {
        Self {
            month,
            total_raised: 0.0,
            individual_raised: 0.0,
            organization_raised: 0.0,
            online_raised: 0.0,
            phone_raised: 0.0,
            event_raised: 0.0,
            corporate_raised: 0.0,
            donation_count: 0,
            donor_count: 0,
            offline_amount: 0.0,
            offline_count: 0,
        }
    }
}

/// One row of `event_rollup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRollupRow {
    pub event_id: EventId,
    pub month: Month,
    pub amount_raised: f64,
    pub donation_count: i64,
    pub donor_count: i64,
}

pub struct RollupStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl RollupStore {
    pub fn open(path: &str) -> RollupResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RollupResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a new, isolated database.
    pub fn reopen(&self) -> RollupResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RollupResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_rollups.sql"))?;
        Ok(())
    }

    /// Begin a transaction on this store's connection. Statements issued
    /// through store methods while the transaction is open participate in
    /// it; drop without commit rolls everything back.
    pub fn begin(&self) -> RollupResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

// ── Date encoding ──────────────────────────────────────────────

/// Dates are stored as ISO-8601 TEXT so lexicographic comparison in SQL
/// matches chronological order.
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(value: &str) -> RollupResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| RollupError::InvalidDate {
        value: value.to_string(),
    })
}
