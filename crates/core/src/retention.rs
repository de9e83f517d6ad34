//! Retention policy definitions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::days_before;
use crate::error::{Error, Result};
use crate::limits::{DEFAULT_MAU_WINDOW_DAYS, DEFAULT_RAW_RETENTION_DAYS};

/// Retention policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Days raw download facts are kept before compaction
    #[serde(default = "default_raw_retention_days")]
    pub raw_retention_days: u32,
    /// Trailing window for MAU snapshots
    #[serde(default = "default_mau_window_days")]
    pub mau_window_days: u32,
}

fn default_raw_retention_days() -> u32 {
    DEFAULT_RAW_RETENTION_DAYS
}

fn default_mau_window_days() -> u32 {
    DEFAULT_MAU_WINDOW_DAYS
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            raw_retention_days: DEFAULT_RAW_RETENTION_DAYS,
            mau_window_days: DEFAULT_MAU_WINDOW_DAYS,
        }
    }
}

impl RetentionPolicy {
    pub fn with_raw_retention_days(mut self, days: u32) -> Self {
        self.raw_retention_days = days;
        self
    }

    /// MAU snapshots read raw facts only, so raw facts must outlive the window.
    pub fn validate(&self) -> Result<()> {
        if self.mau_window_days == 0 {
            return Err(Error::config("mau_window_days must be greater than 0"));
        }
        if self.raw_retention_days < self.mau_window_days {
            return Err(Error::config(format!(
                "raw_retention_days ({}) must be at least mau_window_days ({})",
                self.raw_retention_days, self.mau_window_days
            )));
        }
        Ok(())
    }

    /// Raw facts on dates strictly before this date are eligible for compaction.
    pub fn cutoff_date(&self, today: NaiveDate) -> NaiveDate {
        days_before(today, self.raw_retention_days)
    }
}
