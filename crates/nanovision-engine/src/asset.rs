use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::codec::{self, EncodedPayload, LoadedFile};
use crate::display::{DisplayHandle, DisplayLease, DisplayRegistry};
use crate::error::{CodecError, EditError};

/// Provider results carry no usable content type; they are treated as PNG.
pub const GENERATED_MEDIA_TYPE: &str = "image/png";

/// A declared content type in the `image/*` category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType(String);

impl MediaType {
    pub fn parse(raw: &str) -> Result<Self, EditError> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.strip_prefix("image/") {
            Some(subtype) if !subtype.is_empty() => Ok(Self(normalized)),
            _ => Err(EditError::InvalidMediaType {
                media_type: raw.trim().to_string(),
            }),
        }
    }

    pub fn png() -> Self {
        Self(GENERATED_MEDIA_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn extension(&self) -> &'static str {
        match self.0.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image held by the session. `encoded` always decodes to `raw`.
#[derive(Debug)]
pub struct ImageAsset {
    raw: Arc<[u8]>,
    encoded: EncodedPayload,
    media_type: MediaType,
    digest: String,
    display: DisplayLease,
}

impl ImageAsset {
    pub fn from_loaded(
        loaded: LoadedFile,
        media_type: MediaType,
        displays: &DisplayRegistry,
    ) -> Self {
        let raw: Arc<[u8]> = Arc::from(loaded.raw);
        Self::build(raw, loaded.encoded, media_type, displays)
    }

    pub fn from_encoded(
        encoded: EncodedPayload,
        media_type: MediaType,
        displays: &DisplayRegistry,
    ) -> Result<Self, CodecError> {
        let raw: Arc<[u8]> = Arc::from(codec::decode(&encoded)?);
        Ok(Self::build(raw, encoded, media_type, displays))
    }

    fn build(
        raw: Arc<[u8]>,
        encoded: EncodedPayload,
        media_type: MediaType,
        displays: &DisplayRegistry,
    ) -> Self {
        let digest = hex::encode(Sha256::digest(&raw));
        let display = displays.acquire(Arc::clone(&raw), media_type.as_str());
        Self {
            raw,
            encoded,
            media_type,
            digest,
            display,
        }
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn encoded(&self) -> &EncodedPayload {
        &self.encoded
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn display_handle(&self) -> DisplayHandle {
        self.display.handle()
    }

    /// Hex sha256 of the raw bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn media_type_requires_image_category() {
        assert_eq!(MediaType::parse(" Image/JPEG ").unwrap().as_str(), "image/jpeg");
        for raw in ["application/pdf", "image", "image/", "", "text/image/png"] {
            let err = MediaType::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidMediaType, "{raw}");
        }
    }

    #[test]
    fn extension_follows_media_type() {
        assert_eq!(MediaType::parse("image/jpeg").unwrap().extension(), "jpg");
        assert_eq!(MediaType::png().extension(), "png");
        assert_eq!(MediaType::parse("image/heic").unwrap().extension(), "png");
    }

    #[test]
    fn encoded_payload_matches_raw_bytes() -> anyhow::Result<()> {
        let displays = DisplayRegistry::new();
        let asset = ImageAsset::from_encoded(codec::encode(b"pixels"), MediaType::png(), &displays)?;
        assert_eq!(asset.raw_bytes(), b"pixels");
        assert_eq!(codec::decode(asset.encoded())?, asset.raw_bytes());
        assert_eq!(asset.digest().len(), 64);
        Ok(())
    }

    #[test]
    fn dropping_asset_releases_display_handle() -> anyhow::Result<()> {
        let displays = DisplayRegistry::new();
        let loaded = codec::encode_reader(&b"jpeg"[..])?;
        let asset = ImageAsset::from_loaded(loaded, MediaType::parse("image/jpeg")?, &displays);
        let entry = displays.resolve(asset.display_handle()).expect("live handle");
        assert_eq!(&*entry.bytes, b"jpeg");
        assert_eq!(entry.media_type, "image/jpeg");

        drop(asset);
        assert_eq!(displays.live_count(), 0);
        Ok(())
    }

    #[test]
    fn invalid_payload_acquires_no_handle() {
        let displays = DisplayRegistry::new();
        let result = ImageAsset::from_encoded(
            EncodedPayload::from_base64("%%%"),
            MediaType::png(),
            &displays,
        );
        assert!(result.is_err());
        assert_eq!(displays.live_count(), 0);
    }
}
