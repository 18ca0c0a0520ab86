//! Failure taxonomy for an editing session.

use serde::Serialize;
use thiserror::Error;

/// Failures of the binary codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The source file could not be read.
    #[error("failed to read image data: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    /// The payload is not valid base64.
    #[error("image payload is not valid base64: {source}")]
    InvalidPayload {
        #[source]
        source: base64::DecodeError,
    },
}

/// Every way an upload or edit can fail. `Display` is the message shown to
/// the user when the session enters `Failed`.
#[derive(Error, Debug)]
pub enum EditError {
    #[error("Please upload a valid image file (got '{media_type}').")]
    InvalidMediaType { media_type: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Transport(String),

    /// Message reported by the provider, kept verbatim.
    #[error("{0}")]
    Provider(String),

    #[error("No image data found in the response.")]
    NoImageInResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidMediaType,
    Codec,
    Transport,
    Provider,
    NoImageInResponse,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMediaType => "invalid_media_type",
            Self::Codec => "codec",
            Self::Transport => "transport",
            Self::Provider => "provider",
            Self::NoImageInResponse => "no_image_in_response",
        }
    }
}

impl EditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMediaType { .. } => ErrorKind::InvalidMediaType,
            Self::Codec(_) => ErrorKind::Codec,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Provider(_) => ErrorKind::Provider,
            Self::NoImageInResponse => ErrorKind::NoImageInResponse,
        }
    }
}
