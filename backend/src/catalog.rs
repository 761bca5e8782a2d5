use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{BackendConfig, BackendKind};
use crate::inference::{
    AdapterError, BackendDescriptor, BackendRegistry, InferenceAdapter, MockAdapter,
    RemoteAdapter,
};

/// Live availability view over the configured backends. Descriptors are
/// snapshotted per request so selection never sees a half-updated list.
#[derive(Debug, Default)]
pub struct BackendCatalog {
    descriptors: RwLock<Vec<BackendDescriptor>>,
}

impl BackendCatalog {
    pub fn new(descriptors: Vec<BackendDescriptor>) -> Self {
        Self {
            descriptors: RwLock::new(descriptors),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<BackendDescriptor>> {
        self.descriptors.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<BackendDescriptor>> {
        self.descriptors.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        self.read().clone()
    }

    pub fn available_count(&self) -> usize {
        self.read().iter().filter(|d| d.available).count()
    }

    /// Flips availability for `name`. Returns false for unknown backends.
    pub fn set_available(&self, name: &str, available: bool) -> bool {
        let mut descriptors = self.write();
        match descriptors.iter_mut().find(|d| d.name == name) {
            Some(descriptor) => {
                if descriptor.available != available {
                    log::info!(
                        "Backend {} is now {}",
                        name,
                        if available { "available" } else { "unavailable" }
                    );
                }
                descriptor.available = available;
                true
            }
            None => false,
        }
    }
}

/// Loads every configured backend. A backend that fails to load stays listed
/// as unavailable instead of aborting startup.
pub fn build(configs: &[BackendConfig]) -> (BackendRegistry, BackendCatalog) {
    let mut registry = BackendRegistry::new();
    let mut descriptors = Vec::with_capacity(configs.len());

    for config in configs {
        let descriptor = if !config.enabled {
            log::info!("Backend {} is disabled in config", config.name);
            BackendDescriptor::new(&config.name, config.priority, config.profile).unavailable()
        } else {
            match load_adapter(config).and_then(|adapter| {
                let profile = adapter.profile();
                registry.register(adapter)?;
                Ok(profile)
            }) {
                Ok(profile) => {
                    log::info!(
                        "Backend {} ready ({:?}, priority {}, {})",
                        config.name,
                        config.kind,
                        config.priority,
                        profile
                    );
                    BackendDescriptor::new(&config.name, config.priority, profile)
                }
                Err(e) => {
                    log::error!("Failed to load backend {}: {}", config.name, e);
                    BackendDescriptor::new(&config.name, config.priority, config.profile)
                        .unavailable()
                }
            }
        };
        descriptors.push(descriptor);
    }

    (registry, BackendCatalog::new(descriptors))
}

fn load_adapter(config: &BackendConfig) -> Result<Arc<dyn InferenceAdapter>, AdapterError> {
    match config.kind {
        BackendKind::Mock => Ok(Arc::new(MockAdapter::new())),
        BackendKind::Remote => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                AdapterError::Backend(format!("backend {} has no endpoint", config.name))
            })?;
            let adapter = RemoteAdapter::new(
                &config.name,
                endpoint,
                config.profile,
                config.label_set()?,
                config.top_k,
                config.timeout(),
            )?;
            Ok(Arc::new(adapter))
        }
        BackendKind::Torch => load_torch(config),
    }
}

#[cfg(feature = "torch")]
fn load_torch(config: &BackendConfig) -> Result<Arc<dyn InferenceAdapter>, AdapterError> {
    let model_path = config.model_path.as_deref().ok_or_else(|| {
        AdapterError::Backend(format!("backend {} has no model_path", config.name))
    })?;
    let adapter = crate::inference::torch::TorchAdapter::load(
        &config.name,
        model_path,
        config.profile,
        config.label_set()?,
        config.top_k,
    )?;
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "torch"))]
fn load_torch(config: &BackendConfig) -> Result<Arc<dyn InferenceAdapter>, AdapterError> {
    Err(AdapterError::Backend(format!(
        "backend {} needs TorchScript support; rebuild with --features torch",
        config.name
    )))
}
