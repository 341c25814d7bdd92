//! Query-result cache over the SPARQL backend.
//!
//! [`CachedSparqlStore`] decorates a [`SparqlStore`] with an LRU
//! query-result cache: keys hash the query endpoint URL together with the
//! exact query text, values are the decoded rows. Entries expire on an
//! absolute TTL, capacity evicts least-recently-used, and a background
//! sweeper drops expired entries on an interval using the same lock as the
//! cache itself.
//!
//! Invalidation is coarse: any `append`, `update`, or `delete_all` through
//! the decorator clears every cached result. Graph-scoped invalidation
//! would keep more entries warm and is a possible refinement, but flushing
//! on write is always correct.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use semem_core::error::Result;
use semem_core::interaction::Interaction;
use semem_core::storage::{LoadOutcome, QueryRows, StorageBackend};

use crate::store::SparqlStore;

/// Cache sizing and expiry configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of cached query results
    pub max_size: usize,
    /// Absolute entry lifetime
    pub ttl: Duration,
    /// Sweep interval for expired entries
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

/// Cache counters for monitoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Queries answered from cache
    pub hits: u64,
    /// Queries forwarded to the endpoint
    pub misses: u64,
    /// Entries dropped by TTL or capacity
    pub evictions: u64,
    /// Entries dropped by write invalidation
    pub invalidations: u64,
    /// Current entry count
    pub size: usize,
    /// Configured capacity
    pub capacity: usize,
}

impl CacheMetrics {
    /// Hit rate in `[0, 1]`.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CachedRows {
    rows: QueryRows,
    inserted_at: Instant,
    last_accessed: Instant,
}

struct CacheState {
    entries: LruCache<u64, CachedRows>,
    metrics: CacheMetrics,
}

/// Caching decorator implementing the same storage trait as the backend it
/// wraps.
pub struct CachedSparqlStore {
    inner: Arc<SparqlStore>,
    ttl: Duration,
    state: Arc<Mutex<CacheState>>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for CachedSparqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSparqlStore")
            .field("inner", &self.inner)
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl CachedSparqlStore {
    /// Wrap a SPARQL store and start the background sweeper.
    ///
    /// Must be called from within a Tokio runtime; the sweeper is spawned
    /// onto it and aborted again on [`close`](StorageBackend::close) or
    /// drop.
    #[must_use]
    pub fn new(inner: Arc<SparqlStore>, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size).unwrap_or(NonZeroUsize::MIN);
        let state = Arc::new(Mutex::new(CacheState {
            entries: LruCache::new(capacity),
            metrics: CacheMetrics {
                capacity: capacity.get(),
                ..CacheMetrics::default()
            },
        }));

        let sweeper = tokio::spawn(sweep_loop(
            Arc::downgrade(&state),
            config.ttl,
            config.cleanup_interval,
        ));

        Self {
            inner,
            ttl: config.ttl,
            state,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Current cache counters.
    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }

    /// Drop every cached result. Called internally on any write.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len() as u64;
        state.entries.clear();
        state.metrics.invalidations += dropped;
        state.metrics.size = 0;
        if dropped > 0 {
            debug!(dropped, "query cache invalidated");
        }
    }

    fn cache_key(&self, query: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.query_endpoint().as_bytes());
        hasher.update([0u8]);
        hasher.update(query.as_bytes());
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }

    fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for CachedSparqlStore {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

async fn sweep_loop(
    state: std::sync::Weak<Mutex<CacheState>>,
    ttl: Duration,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.lock();
        let expired: Vec<u64> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= ttl)
            .map(|(key, _)| *key)
            .collect();
        let dropped = expired.len() as u64;
        for key in expired {
            state.entries.pop(&key);
        }
        state.metrics.evictions += dropped;
        state.metrics.size = state.entries.len();
        if dropped > 0 {
            trace!(dropped, "expired query cache entries swept");
        }
    }
}

enum Lookup {
    Hit(QueryRows),
    Expired,
    Miss,
}

#[async_trait]
impl StorageBackend for CachedSparqlStore {
    async fn load_all(&self) -> Result<LoadOutcome> {
        // Bulk rehydration bypasses the cache: it runs once at init and
        // would only be invalidated by the next write anyway.
        self.inner.load_all().await
    }

    async fn append(&self, interaction: &Interaction) -> Result<()> {
        self.inner.append(interaction).await?;
        self.invalidate_all();
        Ok(())
    }

    async fn update(&self, interaction: &Interaction) -> Result<()> {
        self.inner.update(interaction).await?;
        self.invalidate_all();
        Ok(())
    }

    async fn query(&self, query: &str) -> Result<QueryRows> {
        let key = self.cache_key(query);

        let lookup = {
            let mut state = self.state.lock();
            let lookup = match state.entries.get_mut(&key) {
                Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                    entry.last_accessed = Instant::now();
                    Lookup::Hit(entry.rows.clone())
                }
                Some(_) => Lookup::Expired,
                None => Lookup::Miss,
            };
            match &lookup {
                Lookup::Hit(_) => state.metrics.hits += 1,
                Lookup::Expired => {
                    state.entries.pop(&key);
                    state.metrics.evictions += 1;
                    state.metrics.misses += 1;
                    state.metrics.size = state.entries.len();
                }
                Lookup::Miss => state.metrics.misses += 1,
            }
            lookup
        };
        if let Lookup::Hit(rows) = lookup {
            trace!("query cache hit");
            return Ok(rows);
        }

        let rows = self.inner.query(query).await?;

        let mut state = self.state.lock();
        if state.entries.len() == state.entries.cap().get() && !state.entries.contains(&key) {
            state.metrics.evictions += 1;
        }
        let now = Instant::now();
        state.entries.put(
            key,
            CachedRows {
                rows: rows.clone(),
                inserted_at: now,
                last_accessed: now,
            },
        );
        state.metrics.size = state.entries.len();
        Ok(rows)
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await?;
        self.invalidate_all();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    async fn close(&self) -> Result<()> {
        self.stop_sweeper();
        self.inner.close().await
    }
}
