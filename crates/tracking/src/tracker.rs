//! Event tracker: one fact per identity per UTC day.
//!
//! The store enforces the daily identity with a unique key, so the insert
//! itself is the dedup check: an ignored insert means the identity was
//! already counted today. There is no check-then-insert window in which two
//! concurrent calls could both record the same identity.

use chrono::Timelike;
use stats_core::{
    ClientHash, Clock, DownloadEvent, Result, SystemClock, TrackDownload, TrackOutcome,
    VersionCheckEvent,
};
use stats_core::limits::MAX_TOOL_NAME_LEN;
use stats_store::insert::{add_version_updates, insert_download, insert_version_check};
use stats_store::StatsDb;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::resolver::DimensionResolver;

/// Records download and version-check facts.
#[derive(Clone)]
pub struct EventTracker {
    db: StatsDb,
    resolver: DimensionResolver,
    clock: Arc<dyn Clock>,
}

impl EventTracker {
    pub fn new(db: StatsDb, resolver: DimensionResolver) -> Self {
        Self {
            db,
            resolver,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source (tests, replays).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn resolver(&self) -> &DimensionResolver {
        &self.resolver
    }

    /// Record one download unless the same (tool, version, client) was
    /// already recorded during the current UTC day.
    pub fn track_download(&self, request: &TrackDownload) -> Result<TrackOutcome> {
        let start = Instant::now();
        let result = self.record_download(request);
        metrics()
            .track_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match &result {
            Ok(outcome) if outcome.deduplicated => metrics().downloads_deduplicated.inc(),
            Ok(_) => metrics().downloads_tracked.inc(),
            Err(e) => {
                metrics().tracking_errors.inc();
                warn!(tool = %request.tool, version = %request.version, error = %e, "Failed to track download");
            }
        }
        result
    }

    fn record_download(&self, request: &TrackDownload) -> Result<TrackOutcome> {
        request.check()?;

        let tool_id = self.resolver.resolve_tool(&request.tool)?;
        let backend_id = self.resolver.resolve_backend(request.backend.as_deref())?;
        let platform = request.platform();
        let platform_id = self.resolver.resolve_platform(platform.as_ref())?;

        let event = DownloadEvent {
            tool_id,
            backend_id,
            version: request.version.clone(),
            platform_id,
            client: request.client.clone(),
            created_at: self.now_seconds(),
        };

        let inserted = self.db.with_conn(|conn| insert_download(conn, &event))?;

        debug!(
            tool = %request.tool,
            version = %request.version,
            day = %event.day(),
            deduplicated = !inserted,
            "Tracked download"
        );

        Ok(if inserted {
            TrackOutcome::RECORDED
        } else {
            TrackOutcome::DEDUPLICATED
        })
    }

    /// Record one CLI version check unless the client already checked in
    /// during the current UTC day. Identity is the client alone.
    pub fn track_version_check(&self, client: &ClientHash) -> Result<TrackOutcome> {
        let start = Instant::now();
        let event = VersionCheckEvent {
            client: client.clone(),
            created_at: self.now_seconds(),
        };
        let result = self
            .db
            .with_conn(|conn| insert_version_check(conn, &event));
        metrics()
            .track_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(true) => {
                metrics().version_checks_tracked.inc();
                Ok(TrackOutcome::RECORDED)
            }
            Ok(false) => {
                metrics().version_checks_deduplicated.inc();
                Ok(TrackOutcome::DEDUPLICATED)
            }
            Err(e) => {
                metrics().tracking_errors.inc();
                warn!(error = %e, "Failed to track version check");
                Err(e)
            }
        }
    }

    /// Add newly discovered versions of a tool to today's update record.
    ///
    /// Called by the version-sync collaborator. Counts accumulate across calls
    /// on the same day; zero is a no-op.
    pub fn record_version_updates(&self, tool: &str, versions_added: u64) -> Result<()> {
        if versions_added == 0 {
            return Ok(());
        }
        if tool.is_empty() {
            return Err(stats_core::Error::validation("tool name is required"));
        }
        if tool.chars().count() > MAX_TOOL_NAME_LEN {
            return Err(stats_core::Error::validation(format!(
                "tool name exceeds {} characters",
                MAX_TOOL_NAME_LEN
            )));
        }

        let tool_id = self.resolver.resolve_tool(tool)?;
        let today = self.clock.today();
        self.db
            .with_conn(|conn| add_version_updates(conn, today, tool_id, versions_added))?;
        metrics().version_updates_recorded.inc_by(versions_added);

        debug!(tool = tool, versions_added = versions_added, date = %today, "Recorded version updates");
        Ok(())
    }

    fn now_seconds(&self) -> chrono::DateTime<chrono::Utc> {
        let now = self.clock.now();
        now.with_nanosecond(0).unwrap_or(now)
    }
}
