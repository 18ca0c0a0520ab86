//! Remote edit client and the providers it can talk to.

mod dryrun;
mod gemini;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::bail;
use serde_json::Value;

use crate::asset::MediaType;
use crate::codec::EncodedPayload;
use crate::config::ProviderConfig;
use crate::error::EditError;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

/// The edited image returned by a provider.
#[derive(Debug, Clone)]
pub struct EditResult {
    pub payload: EncodedPayload,
    /// Always PNG; providers' own content types are not consulted.
    pub media_type: MediaType,
    /// Text parts returned alongside the image, in order.
    pub commentary: Vec<String>,
}

/// One request/response exchange with an image-editing service.
pub trait EditProvider: Send + Sync {
    fn name(&self) -> &str;
    fn request_edit(
        &self,
        image: &EncodedPayload,
        media_type: &MediaType,
        instruction: &str,
    ) -> Result<EditResult, EditError>;
}

#[derive(Default)]
pub struct EditProviderRegistry {
    providers: BTreeMap<String, Arc<dyn EditProvider>>,
}

impl EditProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: EditProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EditProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(config: &ProviderConfig) -> anyhow::Result<EditProviderRegistry> {
    let mut registry = EditProviderRegistry::new();
    registry.register(DryrunProvider::new());
    registry.register(GeminiProvider::new(config)?);
    Ok(registry)
}

/// Explicitly constructed handle to one provider. Every call is independent:
/// no retries, no queuing, no caching.
#[derive(Clone)]
pub struct RemoteEditClient {
    provider: Arc<dyn EditProvider>,
}

impl RemoteEditClient {
    pub fn new(provider: Arc<dyn EditProvider>) -> Self {
        Self { provider }
    }

    pub fn from_config(config: &ProviderConfig) -> anyhow::Result<Self> {
        let registry = default_provider_registry(config)?;
        let Some(provider) = registry.get(&config.provider) else {
            bail!(
                "unknown provider '{}' (available: {})",
                config.provider,
                registry.names().join(", ")
            );
        };
        Ok(Self::new(provider))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn request_edit(
        &self,
        image: &EncodedPayload,
        media_type: &MediaType,
        instruction: &str,
    ) -> Result<EditResult, EditError> {
        self.provider.request_edit(image, media_type, instruction)
    }
}

/// Scans the first candidate's parts in order and returns the first image
/// part. Text parts are kept as commentary. A structured `error` object is
/// reported verbatim.
pub fn parse_edit_response(response: &Value) -> Result<EditResult, EditError> {
    if let Some(message) = provider_error_message(response) {
        return Err(EditError::Provider(message));
    }

    let parts = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut commentary = Vec::new();
    for part in parts {
        let data = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !data.is_empty() {
            return Ok(EditResult {
                payload: EncodedPayload::from_base64(data),
                media_type: MediaType::png(),
                commentary,
            });
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            commentary.push(text.to_string());
        }
    }

    Err(EditError::NoImageInResponse)
}

pub(crate) fn provider_error_message(response: &Value) -> Option<String> {
    response
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
