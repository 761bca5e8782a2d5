use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::models::CacheEntry;
use super::store::{CacheError, CacheStore};

/// Entry count at which `put` first sweeps expired entries.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

/// In-process store. Expired entries are dropped when read, when a write
/// pushes the map past the sweep mark, and by [`spawn_purger`].
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    min_sweep: usize,
    sweep_at: AtomicUsize,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            entries: RwLock::new(HashMap::new()),
            min_sweep: threshold,
            sweep_at: AtomicUsize::new(threshold),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry that has expired as of `now`, returning how many.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }
}

fn poisoned() -> CacheError {
    CacheError::Store("memory cache lock poisoned".to_string())
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(entry.key.clone(), entry.clone());

        if entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            let now = Utc::now();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            // Live entries double the mark so sweeps stay amortized.
            self.sweep_at
                .store((entries.len() * 2).max(self.min_sweep), Ordering::Relaxed);
            log::debug!(
                "Swept {} expired cache entries, {} remain",
                before - entries.len(),
                entries.len()
            );
        }
        Ok(())
    }
}

/// Periodically drops expired entries from `store` on the current runtime.
pub fn spawn_purger(store: Arc<MemoryCacheStore>, every: Duration) {
    let every = every.max(Duration::from_secs(1));
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.purge_expired(Utc::now()) {
                Ok(0) => {}
                Ok(removed) => log::debug!("Purged {} expired cache entries", removed),
                Err(e) => log::warn!("Cache purge failed: {}", e),
            }
        }
    });
}
