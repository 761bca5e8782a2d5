use serde::{Deserialize, Serialize};
use shared::{BackendInfo, NormalizationProfile};

pub const MOCK_BACKEND: &str = "mock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub available: bool,
    /// Lower ranks are preferred by auto selection.
    pub priority: i32,
    pub profile: NormalizationProfile,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, priority: i32, profile: NormalizationProfile) -> Self {
        Self {
            name: name.into(),
            available: true,
            priority,
            profile,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// The always-present mock backend used when nothing else is loaded.
    pub fn mock_fallback() -> Self {
        Self::new(MOCK_BACKEND, i32::MAX, NormalizationProfile::MobileNet)
    }

    pub fn is_mock(&self) -> bool {
        self.name == MOCK_BACKEND
    }
}

impl From<&BackendDescriptor> for BackendInfo {
    fn from(d: &BackendDescriptor) -> Self {
        BackendInfo {
            name: d.name.clone(),
            available: d.available,
            priority: d.priority,
            profile: d.profile,
        }
    }
}
