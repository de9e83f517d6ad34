//! Rollup row types.
//!
//! Rollups are derived from facts and recomputable; a date's rows are
//! replaced wholesale on every recomputation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dimensions::DimensionId;

/// Downloads across all tools for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGlobalStats {
    pub date: NaiveDate,
    pub total_downloads: u64,
    pub unique_users: u64,
}

/// Downloads of one tool for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyToolStats {
    pub date: NaiveDate,
    pub tool_id: DimensionId,
    pub downloads: u64,
    pub unique_users: u64,
}

/// Downloads through one backend type for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBackendStats {
    pub date: NaiveDate,
    pub backend_type: String,
    pub downloads: u64,
    pub unique_users: u64,
}

/// Downloads of one tool through one backend type. Count only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyToolBackendStats {
    pub date: NaiveDate,
    pub tool_id: DimensionId,
    pub backend_type: String,
    pub downloads: u64,
}

/// Version checks for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVersionStats {
    pub date: NaiveDate,
    pub total_checks: u64,
    pub unique_users: u64,
}

/// Distinct clients across downloads and version checks for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCombinedStats {
    pub date: NaiveDate,
    pub unique_users: u64,
}

/// Trailing-window distinct clients as of a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMauStats {
    pub date: NaiveDate,
    pub mau: u64,
}

/// Compacted download facts for one (tool, backend, version, platform, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRawSummary {
    pub tool_id: DimensionId,
    pub backend_id: Option<DimensionId>,
    pub version: String,
    pub platform_id: Option<DimensionId>,
    pub date: NaiveDate,
    pub downloads: u64,
    pub unique_users: u64,
}

/// Result of the download rollup for a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupSummary {
    pub tool_stats_count: usize,
    pub backend_stats_count: usize,
    pub tool_backend_stats_count: usize,
    pub total_downloads: u64,
    pub unique_users: u64,
}
