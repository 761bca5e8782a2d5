use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::NormalizationProfile;
use std::time::Duration;

use crate::classifier::Prediction;

/// Bumped whenever the meaning of a cached payload changes.
pub const CACHE_KEY_VERSION: &str = "v1";

const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

/// Content-addressed key: identical bytes, backend and profile always map to
/// the same key.
pub fn cache_key(image_data: &[u8], backend_id: &str, profile: NormalizationProfile) -> String {
    format!(
        "classification:{}:{}:{}:{}",
        CACHE_KEY_VERSION,
        calculate_image_hash(image_data),
        backend_id,
        profile
    )
}

/// The full, unfiltered prediction set computed for one (image, backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub backend: String,
    pub predictions: Vec<Prediction>,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(key: String, backend: String, predictions: Vec<Prediction>, ttl: Duration) -> Self {
        Self {
            key,
            backend,
            predictions,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(self.ttl_secs.min(MAX_TTL_SECS) as i64)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_content_addressed() {
        let a = cache_key(b"same bytes", "fast", NormalizationProfile::MobileNet);
        let b = cache_key(b"same bytes", "fast", NormalizationProfile::MobileNet);
        assert_eq!(a, b);
        assert!(a.starts_with("classification:v1:"));
        assert!(a.ends_with(":fast:mobilenet"));
    }

    #[test]
    fn key_changes_with_content_backend_and_profile() {
        let base = cache_key(b"img", "fast", NormalizationProfile::MobileNet);
        assert_ne!(base, cache_key(b"img2", "fast", NormalizationProfile::MobileNet));
        assert_ne!(base, cache_key(b"img", "accurate", NormalizationProfile::MobileNet));
        assert_ne!(base, cache_key(b"img", "fast", NormalizationProfile::Inception));
    }

    #[test]
    fn known_sha256_digest() {
        assert_eq!(
            calculate_image_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn expiry_is_relative_to_creation() {
        let mut entry = CacheEntry::new(
            "k".into(),
            "mock".into(),
            vec![Prediction::new("cat", 0.9, "0")],
            Duration::from_secs(60),
        );
        let created = entry.created_at;
        assert!(!entry.is_expired(created + chrono::Duration::seconds(59)));
        assert!(entry.is_expired(created + chrono::Duration::seconds(60)));

        entry.ttl_secs = 0;
        assert!(entry.is_expired(created));
    }
}
