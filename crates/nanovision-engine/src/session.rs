//! The editing session and the only code allowed to change it.
//!
//! Asynchronous work is split in two halves: a `begin_*`/`submit_*` call that
//! transitions synchronously and hands back a task stamped with a [`Ticket`],
//! and a `complete_*` call that applies the task's result. Any action that
//! supersedes outstanding work bumps the session generation, so completions
//! carrying an older ticket come back as [`Outcome::Stale`] and change nothing.

use std::fmt;

use serde::Serialize;

use crate::asset::{ImageAsset, MediaType};
use crate::codec::{EncodedPayload, LoadedFile};
use crate::display::DisplayRegistry;
use crate::error::{CodecError, EditError, ErrorKind};
use crate::progress::Progress;
use crate::provider::EditResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Uploading,
    Generating,
    Succeeded,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Generating => "generating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, Self::Uploading | Self::Generating)
    }
}

/// Generation stamp handed out with each asynchronous task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EditError> for Failure {
    fn from(err: &EditError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRefusal {
    NoOriginal,
    EmptyInstruction,
    UploadInFlight,
}

impl SubmitRefusal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoOriginal => "no_original",
            Self::EmptyInstruction => "empty_instruction",
            Self::UploadInFlight => "upload_in_flight",
        }
    }
}

#[derive(Debug)]
pub enum UploadRefusal {
    /// Not an `image/*` type; carries the `InvalidMediaType` error.
    Rejected(EditError),
    /// Only reset or a new submit may supersede a running edit.
    EditInFlight,
}

impl UploadRefusal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "invalid_media_type",
            Self::EditInFlight => "edit_in_flight",
        }
    }
}

impl fmt::Display for UploadRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(err) => fmt::Display::fmt(err, f),
            Self::EditInFlight => {
                f.write_str("Wait for the current edit to finish or reset first.")
            }
        }
    }
}

/// A file read the caller must perform, then report via
/// [`Session::complete_upload`].
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub ticket: Ticket,
    pub media_type: MediaType,
}

/// A provider call the caller must perform, then report via
/// [`Session::complete_edit`].
#[derive(Debug, Clone)]
pub struct EditTask {
    pub ticket: Ticket,
    pub image: EncodedPayload,
    pub media_type: MediaType,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetView {
    pub display: u64,
    pub media_type: String,
    pub bytes: usize,
    pub digest: String,
}

impl From<&ImageAsset> for AssetView {
    fn from(asset: &ImageAsset) -> Self {
        Self {
            display: asset.display_handle().id(),
            media_type: asset.media_type().to_string(),
            bytes: asset.raw_bytes().len(),
            digest: asset.digest().to_string(),
        }
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub status: Status,
    pub progress: f64,
    pub instruction: String,
    pub failure: Option<Failure>,
    pub original: Option<AssetView>,
    pub generated: Option<AssetView>,
}

#[derive(Debug)]
pub struct Session {
    original: Option<ImageAsset>,
    generated: Option<ImageAsset>,
    instruction: String,
    status: Status,
    progress: Progress,
    failure: Option<Failure>,
    generation: u64,
    displays: DisplayRegistry,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_displays(DisplayRegistry::new())
    }

    pub fn with_displays(displays: DisplayRegistry) -> Self {
        Self {
            original: None,
            generated: None,
            instruction: String::new(),
            status: Status::Idle,
            progress: Progress::default(),
            failure: None,
            generation: 0,
            displays,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Cosmetic only; meaningful while generating.
    pub fn progress(&self) -> f64 {
        self.progress.value()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn original(&self) -> Option<&ImageAsset> {
        self.original.as_ref()
    }

    pub fn generated(&self) -> Option<&ImageAsset> {
        self.generated.as_ref()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn displays(&self) -> &DisplayRegistry {
        &self.displays
    }

    pub fn set_instruction(&mut self, text: impl Into<String>) {
        self.instruction = text.into();
    }

    /// Starts an upload. Non-image media types are rejected before any file
    /// is read and the held original is kept. A rejection while work is in
    /// flight leaves that work alone; otherwise the session shows the error.
    /// A valid pick supersedes a pending upload but is refused while an edit
    /// is generating.
    pub fn begin_upload(&mut self, media_type: &str) -> Result<UploadTask, UploadRefusal> {
        let media_type = match MediaType::parse(media_type) {
            Ok(media_type) => media_type,
            Err(err) => {
                if !self.status.is_busy() {
                    self.fail(&err);
                }
                return Err(UploadRefusal::Rejected(err));
            }
        };
        if self.status == Status::Generating {
            return Err(UploadRefusal::EditInFlight);
        }

        let ticket = self.supersede();
        self.status = Status::Uploading;
        self.failure = None;
        self.progress.clear();
        Ok(UploadTask { ticket, media_type })
    }

    pub fn complete_upload(
        &mut self,
        task: &UploadTask,
        result: Result<LoadedFile, CodecError>,
    ) -> Outcome {
        if !self.is_current(task.ticket) || self.status != Status::Uploading {
            return Outcome::Stale;
        }
        match result {
            Ok(loaded) => {
                let asset =
                    ImageAsset::from_loaded(loaded, task.media_type.clone(), &self.displays);
                self.original = Some(asset);
                self.generated = None;
                self.failure = None;
                self.status = Status::Idle;
            }
            Err(err) => self.fail(&EditError::Codec(err)),
        }
        Outcome::Applied
    }

    /// Refused without any state change unless an original is held and the
    /// instruction has non-whitespace text. Supersedes an edit in flight.
    pub fn submit_edit(&mut self) -> Result<EditTask, SubmitRefusal> {
        let Some(original) = self.original.as_ref() else {
            return Err(SubmitRefusal::NoOriginal);
        };
        if self.instruction.trim().is_empty() {
            return Err(SubmitRefusal::EmptyInstruction);
        }
        if self.status == Status::Uploading {
            return Err(SubmitRefusal::UploadInFlight);
        }

        let image = original.encoded().clone();
        let media_type = original.media_type().clone();
        let ticket = self.supersede();
        self.generated = None;
        self.failure = None;
        self.progress.clear();
        self.status = Status::Generating;
        Ok(EditTask {
            ticket,
            image,
            media_type,
            instruction: self.instruction.clone(),
        })
    }

    /// Advances the progress estimate; returns false outside `Generating`.
    pub fn tick_progress(&mut self) -> bool {
        if self.status != Status::Generating {
            return false;
        }
        self.progress.tick();
        true
    }

    pub fn complete_edit(
        &mut self,
        ticket: Ticket,
        result: Result<EditResult, EditError>,
    ) -> Outcome {
        if !self.is_current(ticket) || self.status != Status::Generating {
            return Outcome::Stale;
        }
        let decoded = result.and_then(|edit| {
            ImageAsset::from_encoded(edit.payload, edit.media_type, &self.displays)
                .map_err(EditError::from)
        });
        match decoded {
            Ok(asset) => {
                self.generated = Some(asset);
                self.failure = None;
                self.progress.complete();
                self.status = Status::Succeeded;
            }
            Err(err) => self.fail(&err),
        }
        Outcome::Applied
    }

    /// Back to an empty `Idle` session from any state. Work still in flight
    /// is not aborted; its completion will be stale.
    pub fn reset(&mut self) {
        self.supersede();
        self.original = None;
        self.generated = None;
        self.instruction.clear();
        self.failure = None;
        self.progress.clear();
        self.status = Status::Idle;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status,
            progress: self.progress.value(),
            instruction: self.instruction.clone(),
            failure: self.failure.clone(),
            original: self.original.as_ref().map(AssetView::from),
            generated: self.generated.as_ref().map(AssetView::from),
        }
    }

    fn fail(&mut self, err: &EditError) {
        self.failure = Some(Failure::from(err));
        self.progress.clear();
        self.status = Status::Failed;
    }

    fn supersede(&mut self) -> Ticket {
        self.generation += 1;
        Ticket(self.generation)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }
}
