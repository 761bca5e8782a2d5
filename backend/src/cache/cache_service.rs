use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::models::CacheEntry;
use super::store::{CacheError, CacheStore};
use crate::classifier::Prediction;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    writes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub writes: u64,
    /// Percentage of lookups that hit, rounded to two decimals.
    pub hit_rate: f64,
}

/// Best-effort result cache in front of a [`CacheStore`]. Every store call is
/// bounded by `timeout`; failures are logged and read as misses.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    timeout: Duration,
    counters: Arc<CacheCounters>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            timeout,
            counters: Arc::new(CacheCounters::default()),
        }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn lookup(&self, key: &str) -> Option<Vec<Prediction>> {
        let outcome = match tokio::time::timeout(self.timeout, self.store.get(key)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(Some(entry)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Cache hit for {}", key);
                Some(entry.predictions)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Cache lookup failed on {} store for {}: {}",
                    self.store.name(),
                    key,
                    e
                );
                None
            }
        }
    }

    /// Writes the full prediction set; returns whether the write landed.
    pub async fn store(&self, key: String, backend: &str, predictions: Vec<Prediction>) -> bool {
        let entry = CacheEntry::new(key, backend.to_string(), predictions, self.ttl);

        let outcome = match tokio::time::timeout(self.timeout, self.store.put(&entry)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Cache write failed on {} store for {}: {}",
                    self.store.name(),
                    entry.key,
                    e
                );
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            errors: self.counters.errors.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            hit_rate: calculate_hit_rate(hits, misses),
        }
    }
}

pub fn calculate_hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    let rate = hits as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
