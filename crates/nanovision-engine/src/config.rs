use std::env;

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Which provider to call and how to reach it.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            provider: non_empty("NANOVISION_PROVIDER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            model: non_empty("NANOVISION_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            api_key: API_KEY_VARS.iter().find_map(|key| non_empty(*key)),
        }
    }

    pub fn with_overrides(mut self, provider: Option<&str>, model: Option<&str>) -> Self {
        if let Some(provider) = provider.map(str::trim).filter(|value| !value.is_empty()) {
            self.provider = provider.to_ascii_lowercase();
        }
        if let Some(model) = model.map(str::trim).filter(|value| !value.is_empty()) {
            self.model = model.to_string();
        }
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
