//! The daily batch: rollups for yesterday and today, then compaction.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use stats_core::{Clock, RetentionPolicy, SystemClock};
use std::sync::Arc;
use tracing::{error, info, info_span};

use crate::compaction::{CompactionReport, RetentionCompactor};
use crate::rollup::{DateRollup, RollupAggregator};

/// Outcome of one daily batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyJobReport {
    pub rollups: Vec<DateRollup>,
    pub rollup_failures: Vec<(NaiveDate, String)>,
    pub compaction: Option<CompactionReport>,
    pub compaction_error: Option<String>,
}

impl DailyJobReport {
    pub fn is_clean(&self) -> bool {
        self.rollup_failures.is_empty()
            && self.compaction_error.is_none()
            && self.compaction.as_ref().map_or(true, CompactionReport::is_clean)
    }
}

/// Rollups then compaction, in that order.
///
/// Rollups must see a date's raw facts before compaction folds them away, so
/// compaction always runs last. A failed date never stops the other dates.
#[derive(Clone)]
pub struct DailyJob {
    aggregator: RollupAggregator,
    compactor: RetentionCompactor,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl DailyJob {
    pub fn new(
        aggregator: RollupAggregator,
        compactor: RetentionCompactor,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            aggregator: aggregator.with_mau_window(policy.mau_window_days),
            compactor,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the batch for the clock's current date.
    pub fn run(&self) -> DailyJobReport {
        self.run_for(self.clock.today())
    }

    /// Run the batch as if `today` were the current date.
    pub fn run_for(&self, today: NaiveDate) -> DailyJobReport {
        let _span = info_span!("daily_job", today = %today).entered();
        let mut report = DailyJobReport::default();

        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let dates = if yesterday == today {
            vec![today]
        } else {
            vec![yesterday, today]
        };

        for date in dates {
            match self.aggregator.run_all(date) {
                Ok(rollup) => report.rollups.push(rollup),
                Err(e) => {
                    error!(date = %date, error = %e, "Rollup failed");
                    report.rollup_failures.push((date, e.to_string()));
                }
            }
        }

        match self.compactor.compact_before(self.policy.cutoff_date(today)) {
            Ok(compaction) => report.compaction = Some(compaction),
            Err(e) => {
                error!(error = %e, "Compaction failed");
                report.compaction_error = Some(e.to_string());
            }
        }

        info!(
            rollups = report.rollups.len(),
            rollup_failures = report.rollup_failures.len(),
            compacted_rows = report.compaction.as_ref().map_or(0, |c| c.deleted),
            clean = report.is_clean(),
            "Daily job finished"
        );
        report
    }
}
