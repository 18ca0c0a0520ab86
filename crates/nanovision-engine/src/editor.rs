//! Event-loop driver for one editing session.
//!
//! The [`Editor`] is the only owner of the [`Session`]. File reads and
//! provider calls run on worker threads that never touch the session; they
//! post a [`Completion`] onto a single channel, and the driver applies
//! completions one at a time in arrival order.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::bail;
use nanovision_contracts::events::{EventPayload, EventWriter};
use serde_json::{json, Value};

use crate::codec::{self, LoadedFile};
use crate::download::export_generated;
use crate::error::{CodecError, EditError};
use crate::provider::{EditResult, RemoteEditClient};
use crate::session::{
    Outcome, Session, SessionView, Status, SubmitRefusal, Ticket, UploadRefusal, UploadTask,
};

pub enum Completion {
    Upload {
        task: UploadTask,
        result: Result<LoadedFile, CodecError>,
    },
    Edit {
        ticket: Ticket,
        result: Result<EditResult, EditError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitOutcome {
    /// A completion changed the session; carries the new status.
    Applied(Status),
    /// A superseded completion arrived and was discarded.
    Ignored,
    /// Nothing arrived within the tick; carries the progress estimate.
    Ticked(f64),
}

pub struct Editor {
    session: Session,
    client: RemoteEditClient,
    events: EventWriter,
    log_error: Option<String>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Editor {
    /// Fails only when the opening `session_started` row cannot be written;
    /// later log failures never interrupt the session.
    pub fn new(client: RemoteEditClient, events: EventWriter) -> anyhow::Result<Self> {
        events.emit(
            "session_started",
            Status::Idle.as_str(),
            payload(json!({ "provider": client.provider_name() })),
        )?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            session: Session::new(),
            client,
            events,
            log_error: None,
            tx,
            rx,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    /// The most recent event-log write failure, if any.
    pub fn log_error(&self) -> Option<&str> {
        self.log_error.as_deref()
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Starts reading `path`. The media type defaults to a guess from the
    /// file extension.
    pub fn upload(
        &mut self,
        path: &Path,
        media_type: Option<&str>,
    ) -> Result<Ticket, UploadRefusal> {
        let media_type = media_type.unwrap_or_else(|| codec::media_type_for_path(path));
        let task = match self.session.begin_upload(media_type) {
            Ok(task) => task,
            Err(refusal) => {
                let error = match &refusal {
                    UploadRefusal::Rejected(err) => Some(err.kind()),
                    UploadRefusal::EditInFlight => None,
                };
                self.emit(
                    "upload_rejected",
                    json!({
                        "path": path.display().to_string(),
                        "media_type": media_type,
                        "reason": refusal.as_str(),
                        "error_kind": error,
                        "error": refusal.to_string(),
                    }),
                );
                return Err(refusal);
            }
        };

        let ticket = task.ticket;
        let tx = self.tx.clone();
        let worker_task = task.clone();
        let source: PathBuf = path.to_path_buf();
        let spawned = thread::Builder::new()
            .name("nanovision-upload".to_string())
            .spawn(move || {
                let result = codec::encode_file(&source);
                let _ = tx.send(Completion::Upload {
                    task: worker_task,
                    result,
                });
            });
        self.emit(
            "upload_started",
            json!({
                "path": path.display().to_string(),
                "media_type": task.media_type.as_str(),
            }),
        );
        if let Err(source) = spawned {
            self.apply(Completion::Upload {
                task,
                result: Err(CodecError::Read { source }),
            });
        }
        Ok(ticket)
    }

    pub fn set_instruction(&mut self, text: impl Into<String>) {
        self.session.set_instruction(text);
    }

    /// Dispatches the current instruction to the provider. A refused submit
    /// leaves the session unchanged.
    pub fn submit(&mut self) -> Result<Ticket, SubmitRefusal> {
        let task = match self.session.submit_edit() {
            Ok(task) => task,
            Err(refusal) => {
                self.emit("edit_refused", json!({ "reason": refusal.as_str() }));
                return Err(refusal);
            }
        };

        let ticket = task.ticket;
        let submitted = json!({
            "generation": ticket.generation(),
            "provider": self.client.provider_name(),
            "media_type": task.media_type.as_str(),
            "instruction": task.instruction,
            "payload_chars": task.image.len(),
        });
        let tx = self.tx.clone();
        let client = self.client.clone();
        let spawned = thread::Builder::new()
            .name("nanovision-edit".to_string())
            .spawn(move || {
                let result = client.request_edit(&task.image, &task.media_type, &task.instruction);
                let _ = tx.send(Completion::Edit {
                    ticket: task.ticket,
                    result,
                });
            });
        self.emit("edit_submitted", submitted);
        if let Err(err) = spawned {
            self.apply(Completion::Edit {
                ticket,
                result: Err(EditError::Transport(format!(
                    "failed to start provider call: {err}"
                ))),
            });
        }
        Ok(ticket)
    }

    pub fn reset(&mut self) {
        let previous = self.session.status();
        self.session.reset();
        self.emit("session_reset", json!({ "previous_status": previous }));
    }

    /// Waits up to `tick` for the next completion. When none arrives the
    /// progress estimate advances instead.
    pub fn wait(&mut self, tick: Duration) -> WaitOutcome {
        match self.rx.recv_timeout(tick) {
            Ok(completion) => self.apply(completion),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.session.tick_progress();
                WaitOutcome::Ticked(self.session.progress())
            }
        }
    }

    /// Applies every completion already queued, without blocking.
    pub fn pump(&mut self) -> Vec<WaitOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            outcomes.push(self.apply(completion));
        }
        outcomes
    }

    /// Saves the generated image into `dir`. Export errors are returned; the
    /// session is not affected by them.
    pub fn download(&mut self, dir: &Path) -> anyhow::Result<PathBuf> {
        let Some(asset) = self.session.generated() else {
            bail!("no generated image to download");
        };
        let path = export_generated(asset, dir)?;
        let exported = json!({
            "path": path.display().to_string(),
            "digest": asset.digest(),
            "bytes": asset.raw_bytes().len(),
        });
        self.emit("download_exported", exported);
        Ok(path)
    }

    pub fn snapshot(&mut self) -> SessionView {
        let view = self.session.view();
        self.emit("session_snapshot", json!({ "view": view }));
        view
    }

    fn apply(&mut self, completion: Completion) -> WaitOutcome {
        let (kind, outcome, commentary) = match completion {
            Completion::Upload { task, result } => (
                "upload",
                self.session.complete_upload(&task, result),
                Vec::new(),
            ),
            Completion::Edit { ticket, result } => {
                let commentary = result
                    .as_ref()
                    .map(|edit| edit.commentary.clone())
                    .unwrap_or_default();
                ("edit", self.session.complete_edit(ticket, result), commentary)
            }
        };

        if outcome == Outcome::Stale {
            self.emit("completion_ignored", json!({ "kind": kind }));
            return WaitOutcome::Ignored;
        }

        let status = self.session.status();
        let (event_type, details) = match (kind, status) {
            ("upload", Status::Idle) => {
                let asset = self.session.original();
                (
                    "upload_completed".to_string(),
                    json!({
                        "media_type": asset.map(|asset| asset.media_type().to_string()),
                        "digest": asset.map(|asset| asset.digest().to_string()),
                        "bytes": asset.map(|asset| asset.raw_bytes().len()),
                    }),
                )
            }
            ("edit", Status::Succeeded) => {
                let asset = self.session.generated();
                (
                    "edit_succeeded".to_string(),
                    json!({
                        "digest": asset.map(|asset| asset.digest().to_string()),
                        "bytes": asset.map(|asset| asset.raw_bytes().len()),
                        "commentary": commentary,
                    }),
                )
            }
            (_, _) => {
                let failure = self.session.failure();
                (
                    format!("{kind}_failed"),
                    json!({
                        "error_kind": failure.map(|failure| failure.kind),
                        "error": failure.map(|failure| failure.message.clone()),
                    }),
                )
            }
        };
        self.emit(&event_type, details);
        WaitOutcome::Applied(status)
    }

    /// Best effort: a failed write is remembered, never propagated.
    fn emit(&mut self, event_type: &str, details: Value) {
        let status = self.session.status().as_str();
        if let Err(err) = self.events.emit(event_type, status, payload(details)) {
            self.log_error = Some(format!("{err:#}"));
        }
    }
}

fn payload(details: Value) -> EventPayload {
    match details {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}
