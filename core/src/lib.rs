//! rollup-core — pre-computed giving rollups.
//!
//! Maintains queryable monthly and per-event aggregates over a raw
//! donation table so dashboards never scan raw records. Two update paths
//! share the same derivation rules and must stay consistent:
//!
//!   - [`applier::IncrementalApplier`] updates rollups synchronously when
//!     a donation settles or reverses.
//!   - [`rebuild::RebuildEngine`] recomputes a trailing window (or the
//!     full history) from raw records nightly, correcting any drift.
//!
//! Consistency is eventual, bounded by the nightly rebuild window.

pub mod applier;
pub mod config;
pub mod derive;
pub mod error;
pub mod rebuild;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod types;
