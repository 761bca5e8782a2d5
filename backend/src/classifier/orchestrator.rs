use actix_web::web;
use std::cmp::Ordering;
use std::time::Instant;

use super::error::ClassifyError;
use super::models::{ClassificationRequest, ClassificationResult, Prediction};
use crate::cache::{ResultCache, cache_key};
use crate::inference::{BackendDescriptor, BackendRegistry};
use crate::preprocess::Preprocessor;
use crate::selector::{self, Resolution};

/// Entry point of the classification path: selection, cache, preprocessing,
/// inference and result shaping.
#[derive(Clone)]
pub struct Classifier {
    registry: BackendRegistry,
    cache: Option<ResultCache>,
    preprocessor: Preprocessor,
}

impl Classifier {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            cache: None,
            preprocessor: Preprocessor::default(),
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub async fn classify(
        &self,
        request: &ClassificationRequest,
        available: &[BackendDescriptor],
    ) -> Result<ClassificationResult, ClassifyError> {
        request.validate()?;

        let Resolution {
            descriptor,
            fallback,
        } = selector::resolve(&request.backend, available)?;
        let adapter = self
            .registry
            .get(&descriptor.name)
            .ok_or_else(|| ClassifyError::BackendNotFound(descriptor.name.clone()))?;

        let cache = self.cache.as_ref().filter(|_| request.use_cache);
        let key = cache.map(|_| cache_key(&request.image, &descriptor.name, descriptor.profile));

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if let Some(cached) = cache.lookup(key).await {
                let predictions = postprocess(
                    cached,
                    request.confidence_threshold,
                    request.max_results,
                );
                log::info!(
                    "Served {} predictions from cache for backend {}",
                    predictions.len(),
                    descriptor.name
                );
                return Ok(ClassificationResult {
                    predictions,
                    processing_time: 0.0,
                    backend: descriptor.name,
                    threshold_applied: request.confidence_threshold,
                    from_cache: true,
                    fallback,
                });
            }
        }

        let preprocessor = self.preprocessor.clone();
        let image = request.image.clone();
        let profile = descriptor.profile;
        let tensor = web::block(move || preprocessor.prepare(&image, profile))
            .await
            .map_err(|e| ClassifyError::Inference(format!("preprocessing task failed: {}", e)))??;
        debug_assert!(
            tensor.matches_profile(adapter.profile()),
            "backend {} expects {} but descriptor says {}",
            descriptor.name,
            adapter.profile(),
            descriptor.profile
        );

        let started = Instant::now();
        let raw = adapter.infer(&tensor).await.map_err(|e| {
            log::error!("Backend {} failed during inference: {}", descriptor.name, e);
            ClassifyError::from(e)
        })?;
        let processing_time = started.elapsed().as_secs_f64();

        let mut full: Vec<Prediction> = raw
            .into_iter()
            .map(|p| Prediction::new(p.label, p.confidence, p.class_id))
            .collect();
        sort_by_confidence(&mut full);

        if let (Some(cache), Some(key)) = (cache, key) {
            cache.store(key, &descriptor.name, full.clone()).await;
        }

        let predictions = postprocess(full, request.confidence_threshold, request.max_results);
        log::info!(
            "Classified with {}{} in {:.3}s: {} predictions above {}",
            descriptor.name,
            if fallback { " (fallback)" } else { "" },
            processing_time,
            predictions.len(),
            request.confidence_threshold
        );

        Ok(ClassificationResult {
            predictions,
            processing_time,
            backend: descriptor.name,
            threshold_applied: request.confidence_threshold,
            from_cache: false,
            fallback,
        })
    }
}

/// Stable sort by confidence, highest first.
fn sort_by_confidence(predictions: &mut [Prediction]) {
    predictions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
}

/// Shapes a full prediction set for one request: sort, keep `>= threshold`,
/// truncate to `max_results`.
pub fn postprocess(
    mut predictions: Vec<Prediction>,
    threshold: f32,
    max_results: usize,
) -> Vec<Prediction> {
    sort_by_confidence(&mut predictions);
    predictions.retain(|p| p.confidence >= threshold);
    predictions.truncate(max_results);
    predictions
}
