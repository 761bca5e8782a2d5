use image::ImageFormat;
use serde::{Deserialize, Serialize};
use shared::NormalizationProfile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::models::{AUTO_BACKEND, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_RESULTS};
use crate::inference::descriptor::MOCK_BACKEND;
use crate::inference::{AdapterError, LabelSet};
use crate::preprocess::{DEFAULT_ALLOWED_FORMATS, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_IMAGE_BYTES};

pub const CONFIG_PATH_ENV: &str = "VISIONROUTE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/visionroute.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub defaults: RequestDefaults,
    pub upload: UploadConfig,
    pub cache: CacheConfig,
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8081 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub confidence_threshold: f32,
    pub max_results: usize,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_image_bytes: usize,
    pub max_dimension: u32,
    pub max_batch: usize,
    /// Format names as file extensions, e.g. `jpeg`, `png`.
    pub allowed_formats: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_batch: 10,
            allowed_formats: DEFAULT_ALLOWED_FORMATS
                .iter()
                .flat_map(|f| f.extensions_str().first())
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    pub fn image_formats(&self) -> Result<Vec<ImageFormat>, ConfigError> {
        if self.allowed_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "upload.allowed_formats must name at least one format".to_string(),
            ));
        }
        self.allowed_formats
            .iter()
            .map(|name| {
                ImageFormat::from_extension(name.trim().to_ascii_lowercase()).ok_or_else(|| {
                    ConfigError::Invalid(format!("unknown image format '{}'", name))
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStoreKind {
    Memory,
    Dynamodb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub timeout_ms: u64,
    pub store: CacheStoreKind,
    pub table: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            timeout_ms: 250,
            store: CacheStoreKind::Memory,
            table: "visionroute-cache".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Mock,
    Remote,
    Torch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_profile")]
    pub profile: NormalizationProfile,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub labels_file: Option<PathBuf>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_profile() -> NormalizationProfile {
    NormalizationProfile::MobileNet
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    5
}

fn default_backend_timeout_ms() -> u64 {
    10_000
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Inline labels win over `labels_file`.
    pub fn label_set(&self) -> Result<LabelSet, AdapterError> {
        if !self.labels.is_empty() {
            return Ok(LabelSet::new(self.labels.clone()));
        }
        match &self.labels_file {
            Some(path) => LabelSet::from_file(path),
            None => Ok(LabelSet::default()),
        }
    }
}

impl ServiceConfig {
    /// Reads the file named by `VISIONROUTE_CONFIG`, or the default path.
    /// A missing default file yields the built-in configuration.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    log::warn!(
                        "No config at {}, starting with the mock backend only",
                        DEFAULT_CONFIG_PATH
                    );
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.defaults.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "defaults.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.defaults.max_results == 0 {
            return Err(ConfigError::Invalid(
                "defaults.max_results must be at least 1".to_string(),
            ));
        }
        if self.upload.max_batch == 0 {
            return Err(ConfigError::Invalid(
                "upload.max_batch must be at least 1".to_string(),
            ));
        }
        self.upload.image_formats()?;

        let mut seen = HashSet::new();
        for backend in &self.backends {
            let name = backend.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("backend name must not be empty".to_string()));
            }
            if name.eq_ignore_ascii_case(AUTO_BACKEND) {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is reserved for automatic selection",
                    name
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::Invalid(format!("duplicate backend '{}'", name)));
            }
            match backend.kind {
                BackendKind::Mock if name != MOCK_BACKEND => {
                    return Err(ConfigError::Invalid(format!(
                        "mock backend must be named '{}', got '{}'",
                        MOCK_BACKEND, name
                    )));
                }
                BackendKind::Remote if backend.endpoint.is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "remote backend '{}' needs an endpoint",
                        name
                    )));
                }
                BackendKind::Torch if backend.model_path.is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "torch backend '{}' needs a model_path",
                        name
                    )));
                }
                _ => {}
            }
            if backend.kind != BackendKind::Mock && name == MOCK_BACKEND {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is reserved for the built-in mock backend",
                    MOCK_BACKEND
                )));
            }
            if backend.top_k == 0 {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}' top_k must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
defaults:
  confidence_threshold: 0.3
cache:
  store: dynamodb
  table: classifications
  ttl_secs: 600
backends:
  - name: fast
    kind: remote
    priority: 1
    profile: mobilenet
    endpoint: http://localhost:8501/v1/models/mobilenet_v2:predict
    labels: [cat, dog]
  - name: accurate
    kind: torch
    priority: 2
    profile: imagenet_nchw
    model_path: models/resnet50.pt
    enabled: false
  - name: mock
    kind: mock
    priority: 100
"#;

    #[test]
    fn parses_sample_with_defaults_filled_in() {
        let config = ServiceConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.defaults.confidence_threshold, 0.3);
        assert_eq!(config.defaults.max_results, 5);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.cache.store, CacheStoreKind::Dynamodb);
        assert_eq!(config.cache.ttl(), Duration::from_secs(600));
        assert!(config.cache.enabled);

        assert_eq!(config.backends.len(), 3);
        let accurate = &config.backends[1];
        assert_eq!(accurate.profile, NormalizationProfile::ImageNetNchw);
        assert!(!accurate.enabled);
        assert_eq!(accurate.top_k, 5);
        assert_eq!(config.backends[0].label_set().unwrap().len(), 2);
    }

    #[test]
    fn empty_document_is_the_default_config() {
        let config = ServiceConfig::from_yaml_str("{}").unwrap();
        assert!(config.backends.is_empty());
        assert_eq!(config.upload.max_batch, 10);
    }

    #[test]
    fn rejects_reserved_and_duplicate_names() {
        let auto = "backends:\n  - name: auto\n    kind: mock\n";
        assert!(matches!(
            ServiceConfig::from_yaml_str(auto),
            Err(ConfigError::Invalid(_))
        ));

        let dup = "backends:\n  - {name: a, kind: remote, endpoint: 'http://x'}\n  - {name: a, kind: remote, endpoint: 'http://y'}\n";
        assert!(matches!(
            ServiceConfig::from_yaml_str(dup),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn backend_kinds_require_their_settings() {
        let remote = "backends:\n  - {name: r, kind: remote}\n";
        assert!(ServiceConfig::from_yaml_str(remote).is_err());

        let torch = "backends:\n  - {name: t, kind: torch}\n";
        assert!(ServiceConfig::from_yaml_str(torch).is_err());

        let renamed_mock = "backends:\n  - {name: fake, kind: mock}\n";
        assert!(ServiceConfig::from_yaml_str(renamed_mock).is_err());
    }

    #[test]
    fn out_of_range_defaults_are_invalid() {
        let bad = "defaults:\n  confidence_threshold: 1.5\n";
        assert!(ServiceConfig::from_yaml_str(bad).is_err());
        let bad = "defaults:\n  max_results: 0\n";
        assert!(ServiceConfig::from_yaml_str(bad).is_err());
    }

    #[test]
    fn upload_formats_default_to_common_web_formats() {
        let formats = UploadConfig::default().image_formats().unwrap();
        assert_eq!(formats, DEFAULT_ALLOWED_FORMATS.to_vec());

        let config =
            ServiceConfig::from_yaml_str("upload:\n  allowed_formats: [PNG, jpg, tiff]\n").unwrap();
        assert_eq!(
            config.upload.image_formats().unwrap(),
            vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Tiff]
        );
    }

    #[test]
    fn unknown_or_empty_upload_formats_are_invalid() {
        assert!(ServiceConfig::from_yaml_str("upload:\n  allowed_formats: [png, psd]\n").is_err());
        assert!(ServiceConfig::from_yaml_str("upload:\n  allowed_formats: []\n").is_err());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            ServiceConfig::from_yaml_str("backends: [ {name: "),
            Err(ConfigError::Yaml(_))
        ));
    }
}
