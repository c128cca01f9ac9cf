//! Rollup subsystem configuration.

use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Trailing months recomputed by the nightly windowed rebuild.
    #[serde(default = "default_window_months")]
    pub window_months: u32,

    /// Lookback for the manually triggered full rebuild.
    #[serde(default = "default_full_lookback_months")]
    pub full_lookback_months: u32,

    /// UTC hour at which the nightly rebuild fires. Deployment parameter.
    #[serde(default = "default_rebuild_hour_utc")]
    pub rebuild_hour_utc: u32,
}

fn default_window_months() -> u32 {
    18
}

fn default_full_lookback_months() -> u32 {
    120
}

fn default_rebuild_hour_utc() -> u32 {
    2
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            window_months: default_window_months(),
            full_lookback_months: default_full_lookback_months(),
            rebuild_hour_utc: default_rebuild_hour_utc(),
        }
    }
}

impl RollupConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        let config: RollupConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }
}
