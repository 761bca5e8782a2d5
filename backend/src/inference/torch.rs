use actix_web::web;
use async_trait::async_trait;
use shared::NormalizationProfile;
use std::sync::{Arc, Mutex};
use tch::{CModule, Device, Kind, TchError, Tensor};

use super::{
    AdapterError, InferenceAdapter, LabelSet, RawPrediction, ensure_profile, rank_probabilities,
};
use crate::preprocess::NormalizedTensor;

/// TorchScript classifier loaded through libtorch.
#[derive(Clone)]
pub struct TorchAdapter {
    name: String,
    profile: NormalizationProfile,
    labels: LabelSet,
    top_k: usize,
    device: Device,
    model: Arc<Mutex<CModule>>,
}

fn torch_error(err: TchError) -> AdapterError {
    AdapterError::Backend(err.to_string())
}

impl TorchAdapter {
    pub fn load(
        name: impl Into<String>,
        model_path: &str,
        profile: NormalizationProfile,
        labels: LabelSet,
        top_k: usize,
    ) -> Result<Self, AdapterError> {
        let device = Device::cuda_if_available();
        let mut model = CModule::load_on_device(model_path, device)
            .map_err(|e| AdapterError::Backend(format!("failed to load {}: {}", model_path, e)))?;
        model.f_set_eval().map_err(torch_error)?;
        log::info!("Loaded TorchScript model {} on {:?}", model_path, device);

        Ok(Self {
            name: name.into(),
            profile,
            labels,
            top_k,
            device,
            model: Arc::new(Mutex::new(model)),
        })
    }
}

fn to_input(data: &[f32], shape: &[i64], device: Device) -> Result<Tensor, AdapterError> {
    Tensor::f_from_slice(data)
        .and_then(|t| t.f_reshape(shape))
        .and_then(|t| t.f_to_device(device))
        .map_err(torch_error)
}

/// Softmax over the logits of the single batch element.
fn to_scores(logits: &Tensor) -> Result<Vec<f32>, AdapterError> {
    let probs = logits
        .f_softmax(-1, Kind::Float)
        .and_then(|t| t.f_to_device(Device::Cpu))
        .and_then(|t| t.f_view([-1]))
        .map_err(torch_error)?;
    let num_elements = probs.size1().map_err(torch_error)? as usize;
    let mut scores = vec![0.0f32; num_elements];
    probs
        .f_copy_data(&mut scores, num_elements)
        .map_err(torch_error)?;
    Ok(scores)
}

fn forward(
    model: &Mutex<CModule>,
    data: &[f32],
    shape: &[i64],
    device: Device,
) -> Result<Vec<f32>, AdapterError> {
    let input = to_input(data, shape, device)?;
    let logits = {
        let model = model
            .lock()
            .map_err(|_| AdapterError::Backend("model lock poisoned".to_string()))?;
        model.forward_ts(&[input]).map_err(torch_error)?
    };
    to_scores(&logits)
}

#[async_trait]
impl InferenceAdapter for TorchAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> NormalizationProfile {
        self.profile
    }

    async fn infer(&self, tensor: &NormalizedTensor) -> Result<Vec<RawPrediction>, AdapterError> {
        ensure_profile(tensor, self.profile)?;
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let data = tensor.to_vec();
        let model = self.model.clone();
        let device = self.device;

        let scores = web::block(move || forward(&model, &data, &shape, device))
            .await
            .map_err(|e| AdapterError::Backend(format!("inference task failed: {}", e)))??;

        Ok(rank_probabilities(&scores, &self.labels, self.top_k))
    }
}
