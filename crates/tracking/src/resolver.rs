//! Dimension resolver: natural key -> surrogate id.
//!
//! Lookups go through an in-process cache first. On a miss the store is
//! read; an absent key is inserted with insert-or-ignore semantics and then
//! re-read, so concurrent resolvers (in this process or another one) always
//! converge on the single row the store kept.

use moka::sync::Cache;
use stats_core::{DimensionId, Error, NaturalKey, PlatformKey, Result};
use stats_store::dimensions::{find_dimension, insert_dimension_or_ignore};
use stats_store::StatsDb;
use telemetry::metrics;
use tracing::debug;

/// Process-wide natural key -> id cache.
///
/// Append-only and never evicted: dimension rows are immutable once created,
/// so a cached id can never go stale. Clones share the same entries.
#[derive(Clone)]
pub struct DimensionCache {
    inner: Cache<NaturalKey, DimensionId>,
}

impl DimensionCache {
    pub fn new() -> Self {
        // No capacity bound and no expiry: entries are never evicted.
        Self {
            inner: Cache::builder().build(),
        }
    }

    pub fn get(&self, key: &NaturalKey) -> Option<DimensionId> {
        self.inner.get(key)
    }

    fn insert(&self, key: NaturalKey, id: DimensionId) {
        self.inner.insert(key, id);
    }

    /// Approximate number of cached keys.
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DimensionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves tool, backend and platform identities to surrogate ids.
#[derive(Clone)]
pub struct DimensionResolver {
    db: StatsDb,
    cache: DimensionCache,
}

impl DimensionResolver {
    /// Creates a resolver with its own cache.
    pub fn new(db: StatsDb) -> Self {
        Self::with_cache(db, DimensionCache::new())
    }

    /// Creates a resolver sharing an existing cache.
    pub fn with_cache(db: StatsDb, cache: DimensionCache) -> Self {
        Self { db, cache }
    }

    pub fn cache(&self) -> &DimensionCache {
        &self.cache
    }

    /// Resolve any natural key, creating the dimension row if needed.
    pub fn resolve(&self, key: &NaturalKey) -> Result<DimensionId> {
        if let Some(id) = self.cache.get(key) {
            metrics().dimension_cache_hits.inc();
            return Ok(id);
        }
        metrics().dimension_cache_misses.inc();

        let id = self.db.with_conn(|conn| {
            if let Some(id) = find_dimension(conn, key)? {
                return Ok(id);
            }

            if insert_dimension_or_ignore(conn, key)? {
                metrics().dimensions_created.inc();
                debug!(kind = key.kind().as_str(), key = ?key, "Created dimension");
            }

            // Authoritative id regardless of which writer inserted the row
            find_dimension(conn, key)?.ok_or_else(|| {
                Error::internal(format!(
                    "{} dimension missing after insert: {:?}",
                    key.kind().as_str(),
                    key
                ))
            })
        })?;

        self.cache.insert(key.clone(), id);
        metrics().dimension_cache_size.set(self.cache.inner.entry_count());
        Ok(id)
    }

    pub fn resolve_tool(&self, name: &str) -> Result<DimensionId> {
        self.resolve(&NaturalKey::Tool(name.to_string()))
    }

    /// `None` in, `None` out, without touching the store.
    pub fn resolve_backend(&self, full: Option<&str>) -> Result<Option<DimensionId>> {
        match full {
            Some(full) => self.resolve(&NaturalKey::Backend(full.to_string())).map(Some),
            None => Ok(None),
        }
    }

    /// `None` in, `None` out, without touching the store.
    pub fn resolve_platform(&self, platform: Option<&PlatformKey>) -> Result<Option<DimensionId>> {
        match platform {
            Some(platform) => self.resolve(&NaturalKey::Platform(platform.clone())).map(Some),
            None => Ok(None),
        }
    }
}
