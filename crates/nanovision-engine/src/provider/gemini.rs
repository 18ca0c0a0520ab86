use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use super::{parse_edit_response, provider_error_message, truncate_text, EditProvider, EditResult};
use crate::asset::MediaType;
use crate::codec::EncodedPayload;
use crate::config::{ProviderConfig, API_KEY_VARS};
use crate::error::EditError;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    api_base: String,
    model: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        // A hung call stays in flight until the user resets or resubmits.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Image first, then the instruction; no response MIME type or schema,
    /// which image-output models reject.
    pub fn build_request_body(
        image: &EncodedPayload,
        media_type: &MediaType,
        instruction: &str,
    ) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": media_type.as_str(),
                            "data": image.as_str(),
                        }
                    },
                    { "text": instruction },
                ]
            }]
        })
    }
}

impl EditProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn request_edit(
        &self,
        image: &EncodedPayload,
        media_type: &MediaType,
        instruction: &str,
    ) -> Result<EditResult, EditError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(EditError::Provider(format!(
                "Gemini API key missing; set one of {}.",
                API_KEY_VARS.join(", ")
            )));
        };
        let endpoint = self.endpoint();
        let body = Self::build_request_body(image, media_type, instruction);
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .map_err(|err| {
                EditError::Transport(format!("Gemini request failed: {}", err.without_url()))
            })?;
        let payload = response_json_or_error("Gemini", response)?;
        parse_edit_response(&payload)
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value, EditError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| {
        EditError::Transport(format!(
            "{provider} response body read failed: {}",
            err.without_url()
        ))
    })?;
    if !status.is_success() {
        let structured = serde_json::from_str::<Value>(&body)
            .ok()
            .as_ref()
            .and_then(provider_error_message);
        return Err(match structured {
            Some(message) => EditError::Provider(message),
            None => EditError::Transport(format!(
                "{provider} request failed ({code}): {}",
                truncate_text(&body, 512)
            )),
        });
    }
    serde_json::from_str(&body).map_err(|err| {
        EditError::Transport(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    fn provider(model: &str) -> anyhow::Result<GeminiProvider> {
        let config = ProviderConfig::from_lookup(|key| match key {
            "GEMINI_API_BASE" => Some("http://localhost:9/v1beta/".to_string()),
            _ => None,
        })
        .with_overrides(None, Some(model));
        GeminiProvider::new(&config)
    }

    #[test]
    fn endpoint_prefixes_model_path_once() -> anyhow::Result<()> {
        assert_eq!(
            provider("gemini-2.5-flash-image")?.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(
            provider("models/custom")?.endpoint(),
            "http://localhost:9/v1beta/models/custom:generateContent"
        );
        Ok(())
    }

    #[test]
    fn request_body_puts_image_before_instruction() -> anyhow::Result<()> {
        let body = GeminiProvider::build_request_body(
            &codec::encode(b"jpeg"),
            &MediaType::parse("image/jpeg")?,
            "add a hat",
        );
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "anBlZw==");
        assert_eq!(parts[1]["text"], "add a hat");
        assert!(body.get("generationConfig").is_none());
        Ok(())
    }

    #[test]
    fn missing_api_key_fails_without_network() -> anyhow::Result<()> {
        let err = provider("gemini-2.5-flash-image")?
            .request_edit(&codec::encode(b"x"), &MediaType::png(), "add a hat")
            .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        Ok(())
    }
}
