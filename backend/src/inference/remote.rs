use async_trait::async_trait;
use serde::Deserialize;
use shared::NormalizationProfile;
use std::time::Duration;
use url::Url;

use super::{
    AdapterError, InferenceAdapter, LabelSet, RawPrediction, ensure_profile, rank_probabilities,
};
use crate::preprocess::NormalizedTensor;

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

/// Model served behind an HTTP predict endpoint speaking the TF-Serving REST
/// shape: `{"instances": [...]}` in, `{"predictions": [[...]]}` out.
#[derive(Clone)]
pub struct RemoteAdapter {
    name: String,
    endpoint: Url,
    profile: NormalizationProfile,
    labels: LabelSet,
    top_k: usize,
    client: reqwest::Client,
}

impl RemoteAdapter {
    pub fn new(
        name: impl Into<String>,
        endpoint: &str,
        profile: NormalizationProfile,
        labels: LabelSet,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AdapterError::Backend(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(AdapterError::Backend(format!(
                "unsupported endpoint scheme: {}",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Backend(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            endpoint,
            profile,
            labels,
            top_k,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceAdapter for RemoteAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> NormalizationProfile {
        self.profile
    }

    async fn infer(&self, tensor: &NormalizedTensor) -> Result<Vec<RawPrediction>, AdapterError> {
        ensure_profile(tensor, self.profile)?;
        let body = serde_json::json!({ "instances": [tensor.instance()] });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| AdapterError::Remote(e.to_string()))?;

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Remote(format!("malformed predict response: {}", e)))?;

        let scores = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Remote("predict response was empty".to_string()))?;

        Ok(rank_probabilities(&scores, &self.labels, self.top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::NormalizedTensor;
    use actix_web::{App, HttpResponse, HttpServer, web};

    fn labels() -> LabelSet {
        LabelSet::new(vec!["tabby cat".into(), "beagle".into(), "robin".into()])
    }

    #[test]
    fn rejects_unparseable_and_non_http_endpoints() {
        let timeout = Duration::from_secs(1);
        let profile = NormalizationProfile::MobileNet;
        assert!(RemoteAdapter::new("r", "not a url", profile, labels(), 5, timeout).is_err());
        assert!(RemoteAdapter::new("r", "ftp://host/model", profile, labels(), 5, timeout).is_err());
        assert!(
            RemoteAdapter::new("r", "http://localhost:8501/v1/models/m:predict", profile, labels(), 5, timeout)
                .is_ok()
        );
    }

    async fn predict(body: web::Json<serde_json::Value>) -> HttpResponse {
        let rows = body["instances"][0].as_array().map(|a| a.len()).unwrap_or(0);
        if rows != 224 {
            return HttpResponse::BadRequest().finish();
        }
        HttpResponse::Ok().json(serde_json::json!({ "predictions": [[0.1, 0.7, 0.2]] }))
    }

    #[actix_web::test]
    async fn posts_instances_and_ranks_response() {
        let server = HttpServer::new(|| {
            App::new()
                .app_data(web::JsonConfig::default().limit(32 * 1024 * 1024))
                .route("/predict", web::post().to(predict))
        })
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        let handle = server.run();
        actix_web::rt::spawn(handle);

        let adapter = RemoteAdapter::new(
            "remote",
            &format!("http://{}/predict", addr),
            NormalizationProfile::MobileNet,
            labels(),
            2,
            Duration::from_secs(5),
        )
        .unwrap();

        let tensor = NormalizedTensor::zeros(NormalizationProfile::MobileNet);
        let predictions = adapter.infer(&tensor).await.unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, "beagle");
        assert_eq!(predictions[1].label, "robin");
    }

    #[actix_web::test]
    async fn unreachable_endpoint_is_a_remote_error() {
        let adapter = RemoteAdapter::new(
            "remote",
            "http://127.0.0.1:9/predict",
            NormalizationProfile::MobileNet,
            labels(),
            2,
            Duration::from_millis(500),
        )
        .unwrap();
        let tensor = NormalizedTensor::zeros(NormalizationProfile::MobileNet);
        let err = adapter.infer(&tensor).await.unwrap_err();
        assert!(matches!(err, AdapterError::Remote(_)));
    }

    #[actix_web::test]
    async fn mismatched_tensor_is_refused_before_posting() {
        let adapter = RemoteAdapter::new(
            "remote",
            "http://127.0.0.1:9/predict",
            NormalizationProfile::MobileNet,
            labels(),
            2,
            Duration::from_millis(500),
        )
        .unwrap();
        let tensor = NormalizedTensor::zeros(NormalizationProfile::ImageNetNchw);
        let err = adapter.infer(&tensor).await.unwrap_err();
        assert!(matches!(err, AdapterError::ShapeMismatch { .. }), "{:?}", err);
    }
}
