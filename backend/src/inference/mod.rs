pub mod descriptor;
pub mod labels;
pub mod mock;
pub mod registry;
pub mod remote;
#[cfg(feature = "torch")]
pub mod torch;

use async_trait::async_trait;
use shared::NormalizationProfile;

use crate::preprocess::NormalizedTensor;

pub use descriptor::BackendDescriptor;
pub use labels::LabelSet;
pub use mock::MockAdapter;
pub use registry::BackendRegistry;
pub use remote::RemoteAdapter;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Remote backend error: {0}")]
    Remote(String),
    #[error("Tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Label error: {0}")]
    Labels(String),
}

/// One `(label, confidence, class_id)` triple as ranked by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    pub confidence: f32,
    pub class_id: String,
}

/// A single loaded model. Implementations are shared between concurrent
/// requests and must not mutate state in `infer`.
#[async_trait]
pub trait InferenceAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn profile(&self) -> NormalizationProfile;

    async fn infer(&self, tensor: &NormalizedTensor) -> Result<Vec<RawPrediction>, AdapterError>;
}

/// Rejects a tensor that was not prepared for `profile`.
pub fn ensure_profile(
    tensor: &NormalizedTensor,
    profile: NormalizationProfile,
) -> Result<(), AdapterError> {
    if tensor.matches_profile(profile) {
        return Ok(());
    }
    Err(AdapterError::ShapeMismatch {
        expected: NormalizedTensor::expected_shape(profile).to_vec(),
        actual: tensor.shape().to_vec(),
    })
}

/// Ranks a probability vector by descending score, keeping index order for
/// exact ties, and labels the first `top_k` entries.
pub fn rank_probabilities(probs: &[f32], labels: &LabelSet, top_k: usize) -> Vec<RawPrediction> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    indices.sort_by(|&a, &b| {
        probs[b]
            .partial_cmp(&probs[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    indices
        .into_iter()
        .take(top_k)
        .map(|idx| RawPrediction {
            label: labels.label(idx),
            confidence: probs[idx],
            class_id: idx.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_is_descending_and_truncated() {
        let labels = LabelSet::new(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let ranked = rank_probabilities(&[0.1, 0.6, 0.05, 0.25], &labels, 3);
        let names: Vec<_> = ranked.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "a"]);
        assert_eq!(ranked[0].class_id, "1");
    }

    #[test]
    fn ranking_keeps_index_order_for_ties() {
        let labels = LabelSet::new(vec!["x".into(), "y".into(), "z".into()]);
        let ranked = rank_probabilities(&[0.3, 0.4, 0.3], &labels, 10);
        let ids: Vec<_> = ranked.iter().map(|p| p.class_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "0", "2"]);
    }

    #[test]
    fn unknown_indices_get_generated_labels() {
        let labels = LabelSet::new(vec!["only".into()]);
        let ranked = rank_probabilities(&[0.2, 0.8], &labels, 2);
        assert_eq!(ranked[0].label, "class_1");
        assert_eq!(ranked[1].label, "only");
    }

    #[test]
    fn tensors_for_another_profile_are_a_shape_mismatch() {
        let nchw = NormalizedTensor::zeros(NormalizationProfile::ImageNetNchw);
        assert!(ensure_profile(&nchw, NormalizationProfile::ImageNetNchw).is_ok());

        match ensure_profile(&nchw, NormalizationProfile::Inception) {
            Err(AdapterError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, vec![1, 299, 299, 3]);
                assert_eq!(actual, vec![1, 3, 224, 224]);
            }
            other => panic!("expected a shape mismatch, got {:?}", other),
        }
    }
}
