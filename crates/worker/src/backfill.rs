//! Backfill worker for rollup recomputation.

use chrono::NaiveDate;
use serde::Serialize;
use stats_core::clock::date_range;
use stats_core::{Error, Result};
use tracing::{info, warn};

use crate::rollup::RollupAggregator;

/// Worker that recomputes every rollup over a date range.
///
/// Rollups are replaced per date, so a backfill can be repeated or
/// interrupted and restarted freely.
pub struct BackfillWorker {
    aggregator: RollupAggregator,
}

impl BackfillWorker {
    pub fn new(aggregator: RollupAggregator) -> Self {
        Self { aggregator }
    }

    /// Recompute rollups for every date in `[start_date, end_date]`.
    pub fn run(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<BackfillResult> {
        if start_date > end_date {
            return Err(Error::validation(format!(
                "backfill start {} is after end {}",
                start_date, end_date
            )));
        }

        info!(start = %start_date, end = %end_date, "Running backfill");

        let mut result = BackfillResult::default();
        for date in date_range(start_date, end_date) {
            match self.aggregator.run_all(date) {
                Ok(rollup) => {
                    result.dates_processed += 1;
                    result.downloads_recounted += rollup.downloads.total_downloads;
                }
                Err(e) => {
                    warn!(date = %date, error = %e, "Backfill failed for date");
                    result.failed_dates.push((date, e.to_string()));
                }
            }
        }

        info!(
            dates = result.dates_processed,
            downloads = result.downloads_recounted,
            failed = result.failed_dates.len(),
            "Backfill complete"
        );
        Ok(result)
    }
}

/// Result of a backfill run.
#[derive(Debug, Default, Serialize)]
pub struct BackfillResult {
    pub dates_processed: u64,
    pub downloads_recounted: u64,
    pub failed_dates: Vec<(NaiveDate, String)>,
}
