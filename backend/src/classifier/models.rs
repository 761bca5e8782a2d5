use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ClassifyError;

pub const AUTO_BACKEND: &str = "auto";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Backend requested by the caller. `"auto"` on the wire maps to `Auto`, so
/// no configured backend may use that name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Requested {
    #[default]
    Auto,
    Named(String),
}

impl Requested {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Requested::Auto,
            Some(name) if name.eq_ignore_ascii_case(AUTO_BACKEND) => Requested::Auto,
            Some(name) => Requested::Named(name.to_string()),
        }
    }
}

impl From<&str> for Requested {
    fn from(raw: &str) -> Self {
        Requested::parse(Some(raw))
    }
}

impl fmt::Display for Requested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requested::Auto => f.write_str(AUTO_BACKEND),
            Requested::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub image: Vec<u8>,
    pub backend: Requested,
    pub confidence_threshold: f32,
    pub max_results: usize,
    pub use_cache: bool,
}

impl ClassificationRequest {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            backend: Requested::Auto,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
            use_cache: true,
        }
    }

    pub fn with_backend(mut self, backend: impl Into<Requested>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn validate(&self) -> Result<(), ClassifyError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ClassifyError::InvalidRequest(format!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(ClassifyError::InvalidRequest(
                "max results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
    pub class_id: String,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32, class_id: impl Into<String>) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
            class_id: class_id.into(),
        }
    }
}

impl From<Prediction> for shared::PredictionDto {
    fn from(p: Prediction) -> Self {
        shared::PredictionDto {
            class_name: p.label,
            confidence: p.confidence,
            class_id: p.class_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predictions: Vec<Prediction>,
    /// Seconds spent inside the adapter's `infer` call; zero for cache hits.
    pub processing_time: f64,
    pub backend: String,
    pub threshold_applied: f32,
    pub from_cache: bool,
    /// Set when auto selection found no available backend and the built-in
    /// mock answered instead.
    pub fallback: bool,
}
