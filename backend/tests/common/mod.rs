#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use shared::NormalizationProfile;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use visionroute::cache::{CacheEntry, CacheError, CacheStore, MemoryCacheStore, ResultCache};
use visionroute::inference::{AdapterError, InferenceAdapter, RawPrediction, ensure_profile};
use visionroute::preprocess::NormalizedTensor;

pub fn png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x as u8).wrapping_mul(7).wrapping_add(seed),
            (y as u8).wrapping_mul(5),
            seed,
        ])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("png encoding");
    buf.into_inner()
}

pub fn corrupt_bytes() -> Vec<u8> {
    b"definitely not an image".to_vec()
}

pub fn raw(label: &str, confidence: f32, class_id: &str) -> RawPrediction {
    RawPrediction {
        label: label.to_string(),
        confidence,
        class_id: class_id.to_string(),
    }
}

/// Adapter answering a fixed prediction list and counting its calls.
pub struct FakeAdapter {
    name: String,
    profile: NormalizationProfile,
    predictions: Vec<RawPrediction>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(name: &str, predictions: Vec<RawPrediction>) -> Self {
        Self {
            name: name.to_string(),
            profile: NormalizationProfile::MobileNet,
            predictions,
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn standard(name: &str) -> Self {
        Self::new(
            name,
            vec![
                raw("tabby", 0.55, "281"),
                raw("tiger cat", 0.25, "282"),
                raw("egyptian cat", 0.12, "285"),
                raw("lynx", 0.05, "287"),
                raw("fox", 0.03, "277"),
            ],
        )
    }

    pub fn failing(name: &str) -> Self {
        let mut adapter = Self::new(name, Vec::new());
        adapter.fail = true;
        adapter
    }

    pub fn with_profile(mut self, profile: NormalizationProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> NormalizationProfile {
        self.profile
    }

    async fn infer(&self, tensor: &NormalizedTensor) -> Result<Vec<RawPrediction>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure_profile(tensor, self.profile)?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AdapterError::Remote("model server returned 503".to_string()));
        }
        Ok(self.predictions.clone())
    }
}

/// Memory store that counts reads and writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCacheStore,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl CountingStore {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(entry).await
    }
}

/// Store that is always down.
pub struct UnreachableStore;

#[async_trait]
impl CacheStore for UnreachableStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Store("connection refused".to_string()))
    }

    async fn put(&self, _entry: &CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Store("connection refused".to_string()))
    }
}

pub fn cache_over(store: Arc<dyn CacheStore>) -> ResultCache {
    ResultCache::new(store, Duration::from_secs(3600), Duration::from_millis(250))
}
