//! Bounded LRU cache of parsed fixtures
//!
//! Keyed by the `(metadata path, scenario path)` pair. Lookups hand out
//! deep copies, so a run may mutate its state freely without affecting the
//! cached fixture or any other run. Failed loads are not cached.

use super::{load_fixture, Fixture};
use crate::observability::ControllerMetrics;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::debug;

/// Default number of fixtures kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

static GLOBAL_CACHE: OnceLock<Arc<FixtureCache>> = OnceLock::new();

type CacheKey = (PathBuf, PathBuf);

struct CacheEntry {
    fixture: Fixture,
    last_used: u64,
}

/// Accumulated cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
    stats: CacheStats,
}

impl CacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Thread-safe fixture cache with least-recently-used eviction
pub struct FixtureCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    metrics: ControllerMetrics,
}

impl Default for FixtureCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl FixtureCache {
    /// Create a cache holding at most `capacity` fixtures (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
            metrics: ControllerMetrics::new(),
        }
    }

    /// Process-wide cache with the default capacity
    pub fn global() -> Arc<FixtureCache> {
        GLOBAL_CACHE
            .get_or_init(|| Arc::new(FixtureCache::default()))
            .clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return a private copy of the fixture, reading it from disk on a miss
    pub fn load(&self, meta_path: &Path, scenario_path: &Path) -> Result<Fixture> {
        let key: CacheKey = (meta_path.to_path_buf(), scenario_path.to_path_buf());

        {
            let mut inner = self.lock();
            let now = inner.tick();
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.last_used = now;
                let fixture = entry.fixture.clone();
                inner.stats.hits += 1;
                self.metrics.inc_fixture_cache(true);
                debug!(scenario = %scenario_path.display(), hits = inner.stats.hits, "Fixture cache hit");
                return Ok(fixture);
            }
            inner.stats.misses += 1;
        }
        self.metrics.inc_fixture_cache(false);

        // Read outside the lock; a concurrent miss on the same key just
        // replaces an identical entry.
        let fixture = load_fixture(meta_path, scenario_path)?;

        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
                debug!(evicted = %oldest.1.display(), "Fixture cache eviction");
            }
        }
        let now = inner.tick();
        inner.entries.insert(
            key,
            CacheEntry {
                fixture: fixture.clone(),
                last_used: now,
            },
        );

        Ok(fixture)
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached fixture; statistics are kept
    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}
