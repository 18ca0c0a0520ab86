//! Lossless conversion between image bytes and their base64 transport form.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::CodecError;

/// Standard, padded base64 text. Never carries a `data:` prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    /// Wraps text received from a provider. Validity is only checked by [`decode`].
    pub fn from_base64(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Payloads can be megabytes; keep them out of debug output.
impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedPayload({} chars)", self.0.len())
    }
}

/// Bytes read from a selected file together with their encoding.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub raw: Vec<u8>,
    pub encoded: EncodedPayload,
}

pub fn encode(bytes: &[u8]) -> EncodedPayload {
    EncodedPayload(BASE64.encode(bytes))
}

pub fn decode(payload: &EncodedPayload) -> Result<Vec<u8>, CodecError> {
    BASE64
        .decode(payload.0.trim().as_bytes())
        .map_err(|source| CodecError::InvalidPayload { source })
}

pub fn encode_reader<R: Read>(mut reader: R) -> Result<LoadedFile, CodecError> {
    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .map_err(|source| CodecError::Read { source })?;
    let encoded = encode(&raw);
    Ok(LoadedFile { raw, encoded })
}

pub fn encode_file(path: &Path) -> Result<LoadedFile, CodecError> {
    let file = File::open(path).map_err(|source| CodecError::Read { source })?;
    encode_reader(file)
}

pub fn to_data_url(media_type: &str, payload: &EncodedPayload) -> String {
    format!("data:{media_type};base64,{}", payload.as_str())
}

/// Extension-based media type guess for files picked from disk.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
