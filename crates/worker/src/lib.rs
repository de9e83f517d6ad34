//! Background work for the stats engine.
//!
//! Handles the batch side:
//! - Rollup aggregation (facts -> per-date summary rows)
//! - Retention compaction (aged raw facts -> daily summary rows)
//! - Backfill (rollup recomputation over a range)
//! - The daily job and its interval scheduler

pub mod backfill;
pub mod compaction;
pub mod facts;
pub mod job;
pub mod rollup;
pub mod scheduler;

pub use backfill::{BackfillResult, BackfillWorker};
pub use compaction::{CompactionFailure, CompactionReport, RetentionCompactor};
pub use facts::{CompactedDownloads, DownloadFact, DownloadFactSource, FactClients, RawDownloads};
pub use job::{DailyJob, DailyJobReport};
pub use rollup::{DateRollup, RollupAggregator};
pub use scheduler::*;
