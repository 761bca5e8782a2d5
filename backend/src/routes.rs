use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use shared::{
    BackendInfo, BatchClassifyResponse, BatchError, CacheStatsResponse, ClassifyRequest,
    ClassifyResponse, HealthResponse, ModelsResponse, PredictionDto,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::BackendCatalog;
use crate::classifier::{
    ClassificationRequest, ClassificationResult, Classifier, ClassifyError, LogResultSink,
    Requested, ResultSink,
};
use crate::config::{RequestDefaults, UploadConfig};
use crate::selector;

const DEFAULT_FILENAME: &str = "upload";

/// Shared handler state, registered once as `web::Data<AppState>`.
pub struct AppState {
    pub classifier: Classifier,
    pub catalog: Arc<BackendCatalog>,
    pub sink: Arc<dyn ResultSink>,
    pub defaults: RequestDefaults,
    pub upload: UploadConfig,
}

impl AppState {
    pub fn new(
        classifier: Classifier,
        catalog: Arc<BackendCatalog>,
        defaults: RequestDefaults,
        upload: UploadConfig,
    ) -> Self {
        Self {
            classifier,
            catalog,
            sink: Arc::new(LogResultSink),
            defaults,
            upload,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, upload: &UploadConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(json_body_limit(upload.max_image_bytes))
            .error_handler(|err, _req| ClassifyError::InvalidRequest(err.to_string()).into()),
    )
    .service(web::resource("/api/classify").route(web::post().to(classify_upload)))
    .service(web::resource("/api/classify/json").route(web::post().to(classify_json)))
    .service(web::resource("/api/classify/batch").route(web::post().to(classify_batch)))
    .service(web::resource("/api/models").route(web::get().to(list_models)))
    .service(web::resource("/api/cache/stats").route(web::get().to(cache_stats)))
    .service(web::resource("/api/health").route(web::get().to(health)));
}

/// Base64 inflates by 4/3; leave room for the other request fields.
fn json_body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes / 3 * 4 + 64 * 1024
}

#[derive(Debug, Default, Clone)]
struct RequestOptions {
    backend: Option<String>,
    confidence_threshold: Option<f32>,
    max_results: Option<usize>,
    use_cache: Option<bool>,
}

impl RequestOptions {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ClassifyError> {
        let confidence_threshold = fields
            .get("confidence_threshold")
            .map(|raw| {
                raw.trim().parse::<f32>().map_err(|_| {
                    ClassifyError::InvalidRequest(format!("invalid confidence_threshold '{}'", raw))
                })
            })
            .transpose()?;
        let max_results = fields
            .get("max_results")
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|_| {
                    ClassifyError::InvalidRequest(format!("invalid max_results '{}'", raw))
                })
            })
            .transpose()?;
        let use_cache = fields.get("use_cache").map(|raw| parse_flag(raw)).transpose()?;

        Ok(Self {
            backend: fields.get("backend").cloned(),
            confidence_threshold,
            max_results,
            use_cache,
        })
    }

    fn to_request(&self, image: Vec<u8>, defaults: &RequestDefaults) -> ClassificationRequest {
        ClassificationRequest::new(image)
            .with_backend(Requested::parse(self.backend.as_deref()))
            .with_threshold(
                self.confidence_threshold
                    .unwrap_or(defaults.confidence_threshold),
            )
            .with_max_results(self.max_results.unwrap_or(defaults.max_results))
            .with_cache(self.use_cache.unwrap_or(true))
    }
}

fn parse_flag(raw: &str) -> Result<bool, ClassifyError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ClassifyError::InvalidRequest(format!(
            "invalid use_cache '{}'",
            raw
        ))),
    }
}

struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

/// Parts with a filename are image uploads; the rest are text fields.
/// A file part beyond `max_files` fails the request before it is read.
async fn read_multipart(
    payload: &mut Multipart,
    max_part_bytes: usize,
    max_files: usize,
) -> Result<UploadForm, Error> {
    let mut form = UploadForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => (String::new(), None),
        };
        if filename.is_some() && form.files.len() >= max_files {
            return Err(ClassifyError::InvalidRequest(format!(
                "upload carries more than {} file(s)",
                max_files
            ))
            .into());
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > max_part_bytes {
                return Err(ClassifyError::ImageDecode(format!(
                    "upload part '{}' exceeds {} bytes",
                    filename.as_deref().unwrap_or(&name),
                    max_part_bytes
                ))
                .into());
            }
            data.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) => form.files.push(UploadedFile { filename, data }),
            None => {
                let value = String::from_utf8(data).map_err(|_| {
                    ClassifyError::InvalidRequest(format!("field '{}' is not valid UTF-8", name))
                })?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

fn decode_image_data(encoded: &str) -> Result<Vec<u8>, ClassifyError> {
    let payload = match encoded.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ClassifyError::ImageDecode(format!("invalid base64 image data: {}", e)))
}

fn to_response(filename: String, result: ClassificationResult) -> ClassifyResponse {
    let confidence_scores = result
        .predictions
        .iter()
        .map(|p| (p.label.clone(), p.confidence))
        .collect();

    ClassifyResponse {
        id: Uuid::new_v4(),
        filename,
        predictions: result.predictions.into_iter().map(PredictionDto::from).collect(),
        confidence_scores,
        processing_time: result.processing_time,
        model_used: result.backend,
        threshold_applied: result.threshold_applied,
        from_cache: result.from_cache,
        fallback: result.fallback,
        timestamp: Utc::now(),
    }
}

async fn run_classification(
    state: &AppState,
    filename: String,
    image: Vec<u8>,
    options: &RequestOptions,
) -> Result<ClassifyResponse, ClassifyError> {
    let request = options.to_request(image, &state.defaults);
    let result = state
        .classifier
        .classify(&request, &state.catalog.descriptors())
        .await?;

    let sink = state.sink.clone();
    let record_name = filename.clone();
    let record = result.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = sink.record(&record_name, &record).await {
            log::error!("Failed to record classification of {}: {}", record_name, e);
        }
    });

    Ok(to_response(filename, result))
}

async fn classify_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let form = read_multipart(&mut payload, state.upload.max_image_bytes, 1).await?;
    let options = RequestOptions::from_fields(&form.fields)?;
    let file = form
        .files
        .into_iter()
        .next()
        .ok_or_else(|| ClassifyError::InvalidRequest("no image file in upload".to_string()))?;

    let response = run_classification(&state, file.filename, file.data, &options).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn classify_json(
    state: web::Data<AppState>,
    body: web::Json<ClassifyRequest>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    let image = decode_image_data(&body.image_data)?;
    let options = RequestOptions {
        backend: body.backend,
        confidence_threshold: body.confidence_threshold,
        max_results: body.max_results,
        use_cache: body.use_cache,
    };
    let filename = body
        .filename
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    let response = run_classification(&state, filename, image, &options).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn classify_batch(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let form = read_multipart(
        &mut payload,
        state.upload.max_image_bytes,
        state.upload.max_batch,
    )
    .await?;
    if form.files.is_empty() {
        return Err(ClassifyError::InvalidRequest("no image files in upload".to_string()).into());
    }
    let options = RequestOptions::from_fields(&form.fields)?;
    let total_files = form.files.len();

    let outcomes = futures::future::join_all(form.files.into_iter().map(|file| {
        let state = &state;
        let options = &options;
        async move {
            let filename = file.filename.clone();
            run_classification(state, file.filename, file.data, options)
                .await
                .map_err(|e| {
                    log::warn!("Batch item {} failed: {}", filename, e);
                    BatchError {
                        filename,
                        error: e.to_string(),
                    }
                })
        }
    }))
    .await;

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(response) => results.push(response),
            Err(error) => errors.push(error),
        }
    }

    log::info!(
        "Batch classified {} of {} files",
        results.len(),
        total_files
    );

    Ok(HttpResponse::Ok().json(BatchClassifyResponse {
        batch_id: Uuid::new_v4(),
        total_files,
        successful_classifications: results.len(),
        failed_classifications: errors.len(),
        results,
        errors,
        timestamp: Utc::now(),
    }))
}

async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    let descriptors = state.catalog.descriptors();
    let (default_model, default_is_fallback) =
        match selector::resolve(&Requested::Auto, &descriptors) {
            Ok(resolution) => (resolution.descriptor.name, resolution.fallback),
            Err(e) => {
                log::error!("Auto selection failed: {}", e);
                (String::new(), true)
            }
        };

    HttpResponse::Ok().json(ModelsResponse {
        available_models: descriptors.iter().map(BackendInfo::from).collect(),
        default_model,
        default_is_fallback,
    })
}

async fn cache_stats(state: web::Data<AppState>) -> HttpResponse {
    let response = match state.classifier.cache() {
        Some(cache) => {
            let stats = cache.stats();
            CacheStatsResponse {
                enabled: true,
                store: Some(cache.store_name().to_string()),
                hits: stats.hits,
                misses: stats.misses,
                errors: stats.errors,
                writes: stats.writes,
                hit_rate: stats.hit_rate,
            }
        }
        None => CacheStatsResponse::default(),
    };
    HttpResponse::Ok().json(response)
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let backends_available = state.catalog.available_count();
    HttpResponse::Ok().json(HealthResponse {
        status: if backends_available > 0 {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        backends_available,
        cache_enabled: state.classifier.cache().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn options_fall_back_to_configured_defaults() {
        let defaults = RequestDefaults {
            confidence_threshold: 0.25,
            max_results: 3,
        };
        let request = RequestOptions::default().to_request(vec![1, 2, 3], &defaults);
        assert_eq!(request.backend, Requested::Auto);
        assert_eq!(request.confidence_threshold, 0.25);
        assert_eq!(request.max_results, 3);
        assert!(request.use_cache);
    }

    #[test]
    fn form_fields_override_defaults() {
        let options = RequestOptions::from_fields(&fields(&[
            ("backend", "fast"),
            ("confidence_threshold", "0.1"),
            ("max_results", "2"),
            ("use_cache", "false"),
        ]))
        .unwrap();
        let request = options.to_request(Vec::new(), &RequestDefaults::default());
        assert_eq!(request.backend, Requested::Named("fast".into()));
        assert_eq!(request.confidence_threshold, 0.1);
        assert_eq!(request.max_results, 2);
        assert!(!request.use_cache);
    }

    #[test]
    fn malformed_fields_are_invalid_requests() {
        for pairs in [
            [("confidence_threshold", "high")],
            [("max_results", "-1")],
            [("use_cache", "maybe")],
        ] {
            let err = RequestOptions::from_fields(&fields(&pairs)).unwrap_err();
            assert!(matches!(err, ClassifyError::InvalidRequest(_)));
        }
    }

    #[test]
    fn base64_accepts_plain_and_data_urls() {
        assert_eq!(decode_image_data("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_image_data("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode_image_data("not base64!"),
            Err(ClassifyError::ImageDecode(_))
        ));
    }

    #[test]
    fn json_limit_covers_encoded_max_image() {
        let max = 10 * 1024 * 1024;
        assert!(json_body_limit(max) > max / 3 * 4);
    }
}
