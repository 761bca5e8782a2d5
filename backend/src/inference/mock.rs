use async_trait::async_trait;
use shared::NormalizationProfile;

use super::descriptor::MOCK_BACKEND;
use super::{AdapterError, InferenceAdapter, RawPrediction};
use crate::preprocess::NormalizedTensor;

const MOCK_SCORES: [(&str, f32); 5] = [
    ("cat", 0.8),
    ("dog", 0.15),
    ("bird", 0.03),
    ("car", 0.015),
    ("airplane", 0.005),
];

/// Deterministic stand-in that answers without a model.
#[derive(Debug, Clone, Default)]
pub struct MockAdapter;

impl MockAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InferenceAdapter for MockAdapter {
    fn name(&self) -> &str {
        MOCK_BACKEND
    }

    fn profile(&self) -> NormalizationProfile {
        NormalizationProfile::MobileNet
    }

    async fn infer(&self, _tensor: &NormalizedTensor) -> Result<Vec<RawPrediction>, AdapterError> {
        Ok(MOCK_SCORES
            .iter()
            .enumerate()
            .map(|(idx, (label, confidence))| RawPrediction {
                label: label.to_string(),
                confidence: *confidence,
                class_id: idx.to_string(),
            })
            .collect())
    }
}
