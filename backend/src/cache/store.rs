use async_trait::async_trait;
use std::time::Duration;

use super::models::CacheEntry;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// External key/value store holding cache entries. `get` must report expired
/// entries as absent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError>;
}
