//! Shared primitive types used across the rollup crate.

/// A stable, unique identifier for a donation record.
pub type RecordId = String;

/// A stable, unique identifier for a contributor.
pub type ContributorId = String;

/// A stable, unique identifier for a fundraising event.
pub type EventId = String;

/// A rollup partition key: always the first day of a calendar month.
/// The implied time is midnight UTC.
pub type Month = chrono::NaiveDate;
