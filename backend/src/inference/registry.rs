use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::MOCK_BACKEND;
use super::{AdapterError, InferenceAdapter, MockAdapter};
use crate::classifier::models::AUTO_BACKEND;

/// Adapters keyed by backend id. The mock adapter is always registered so
/// the auto fallback has something to run.
#[derive(Clone)]
pub struct BackendRegistry {
    adapters: HashMap<String, Arc<dyn InferenceAdapter>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        let mut adapters: HashMap<String, Arc<dyn InferenceAdapter>> = HashMap::new();
        adapters.insert(MOCK_BACKEND.to_string(), Arc::new(MockAdapter::new()));
        Self { adapters }
    }

    pub fn register(&mut self, adapter: Arc<dyn InferenceAdapter>) -> Result<(), AdapterError> {
        let name = adapter.name().to_string();
        if name.trim().is_empty() {
            return Err(AdapterError::Backend("backend name must not be empty".to_string()));
        }
        if name.eq_ignore_ascii_case(AUTO_BACKEND) {
            return Err(AdapterError::Backend(format!(
                "'{}' is reserved for automatic selection",
                name
            )));
        }
        if name != MOCK_BACKEND && self.adapters.contains_key(&name) {
            return Err(AdapterError::Backend(format!(
                "backend '{}' is already registered",
                name
            )));
        }

        log::debug!("Registered backend {} ({})", name, adapter.profile());
        self.adapters.insert(name, adapter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InferenceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}
