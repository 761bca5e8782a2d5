use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessing convention a backend expects: input resolution, tensor
/// layout and the numeric transform applied to each pixel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum NormalizationProfile {
    #[serde(rename = "mobilenet")]
    #[strum(serialize = "mobilenet")]
    MobileNet,
    #[serde(rename = "inception")]
    #[strum(serialize = "inception")]
    Inception,
    #[serde(rename = "imagenet_nchw")]
    #[strum(serialize = "imagenet_nchw")]
    ImageNetNchw,
    #[serde(rename = "imagenet_nhwc")]
    #[strum(serialize = "imagenet_nhwc")]
    ImageNetNhwc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TensorLayout {
    /// `[batch, channels, height, width]`
    Nchw,
    /// `[batch, height, width, channels]`
    Nhwc,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PixelTransform {
    /// `x / 255 * 2 - 1`, mapping pixels to `[-1, 1]`.
    SymmetricRescale,
    /// `(x / 255 - mean[c]) / std[c]`
    Standardize { mean: [f32; 3], std: [f32; 3] },
}

impl NormalizationProfile {
    /// Target `(width, height)`.
    pub fn input_size(&self) -> (u32, u32) {
        match self {
            NormalizationProfile::Inception => (299, 299),
            _ => (224, 224),
        }
    }

    pub fn layout(&self) -> TensorLayout {
        match self {
            NormalizationProfile::ImageNetNchw => TensorLayout::Nchw,
            _ => TensorLayout::Nhwc,
        }
    }

    pub fn transform(&self) -> PixelTransform {
        match self {
            NormalizationProfile::MobileNet | NormalizationProfile::Inception => {
                PixelTransform::SymmetricRescale
            }
            NormalizationProfile::ImageNetNchw | NormalizationProfile::ImageNetNhwc => {
                PixelTransform::Standardize {
                    mean: IMAGENET_MEAN,
                    std: IMAGENET_STD,
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ClassifyRequest {
    /// Base64-encoded image bytes.
    pub image_data: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub use_cache: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionDto {
    pub class_name: String,
    pub confidence: f32,
    pub class_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClassifyResponse {
    pub id: Uuid,
    pub filename: String,
    pub predictions: Vec<PredictionDto>,
    pub confidence_scores: HashMap<String, f32>,
    pub processing_time: f64,
    pub model_used: String,
    pub threshold_applied: f32,
    pub from_cache: bool,
    pub fallback: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BatchError {
    pub filename: String,
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BatchClassifyResponse {
    pub batch_id: Uuid,
    pub total_files: usize,
    pub successful_classifications: usize,
    pub failed_classifications: usize,
    pub results: Vec<ClassifyResponse>,
    pub errors: Vec<BatchError>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackendInfo {
    pub name: String,
    pub available: bool,
    pub priority: i32,
    pub profile: NormalizationProfile,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelsResponse {
    pub available_models: Vec<BackendInfo>,
    pub default_model: String,
    pub default_is_fallback: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CacheStatsResponse {
    pub enabled: bool,
    pub store: Option<String>,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub writes: u64,
    pub hit_rate: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub backends_available: usize,
    pub cache_enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn profile_names_round_trip_through_strum() {
        for profile in NormalizationProfile::iter() {
            let parsed = NormalizationProfile::from_str(&profile.to_string()).unwrap();
            assert_eq!(parsed, profile);
        }
        assert_eq!(
            NormalizationProfile::from_str("imagenet_nchw").unwrap(),
            NormalizationProfile::ImageNetNchw
        );
    }

    #[test]
    fn torch_profile_is_channels_first_and_standardized() {
        let profile = NormalizationProfile::ImageNetNchw;
        assert_eq!(profile.layout(), TensorLayout::Nchw);
        assert_eq!(profile.input_size(), (224, 224));
        assert_eq!(
            profile.transform(),
            PixelTransform::Standardize {
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD
            }
        );
    }

    #[test]
    fn inception_uses_larger_input() {
        assert_eq!(NormalizationProfile::Inception.input_size(), (299, 299));
        assert_eq!(
            NormalizationProfile::Inception.transform(),
            PixelTransform::SymmetricRescale
        );
    }

    #[test]
    fn request_defaults_are_optional() {
        let req: ClassifyRequest = serde_json::from_str(r#"{"image_data":"AAAA"}"#).unwrap();
        assert!(req.backend.is_none());
        assert!(req.use_cache.is_none());
    }
}
