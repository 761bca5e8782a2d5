pub mod cache_service;
pub mod dynamodb_store;
pub mod memory_store;
pub mod models;
pub mod store;

pub use cache_service::{CacheStats, ResultCache};
pub use dynamodb_store::DynamoCacheStore;
pub use memory_store::{MemoryCacheStore, spawn_purger};
pub use models::{CacheEntry, cache_key};
pub use store::{CacheError, CacheStore};
