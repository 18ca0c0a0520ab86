//! Upload, remote edit, and display core for the nanovision image editor.

pub mod asset;
pub mod codec;
pub mod config;
pub mod display;
pub mod download;
pub mod editor;
pub mod error;
pub mod progress;
pub mod provider;
pub mod session;

pub use asset::{ImageAsset, MediaType};
pub use codec::{EncodedPayload, LoadedFile};
pub use config::ProviderConfig;
pub use display::{DisplayHandle, DisplayLease, DisplayRegistry};
pub use editor::{Completion, Editor, WaitOutcome};
pub use error::{CodecError, EditError, ErrorKind};
pub use provider::{EditProvider, EditResult, RemoteEditClient};
pub use session::{
    Failure, Outcome, Session, SessionView, Status, SubmitRefusal, Ticket, UploadRefusal,
};
