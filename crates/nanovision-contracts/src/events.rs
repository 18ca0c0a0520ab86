use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Keys every row carries. Payload entries with these names are dropped.
pub const RESERVED_KEYS: [&str; 5] = ["seq", "ts", "session_id", "type", "status"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum EventSink {
    File(PathBuf),
    Discard,
}

/// Append-only log of one editing session, one compact JSON object per line:
///
/// `{"seq":3,"ts":"..","session_id":"..","type":"edit_submitted","status":"generating",..}`
///
/// `seq` starts at 1 and follows file order; `status` is the session status
/// after the logged action. Clones share the sequence and the file lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    sink: EventSink,
    session_id: String,
    last_seq: Mutex<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self::with_sink(EventSink::File(path.into()), session_id.into())
    }

    /// Builds rows without writing them anywhere.
    pub fn discard(session_id: impl Into<String>) -> Self {
        Self::with_sink(EventSink::Discard, session_id.into())
    }

    fn with_sink(sink: EventSink, session_id: String) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                sink,
                session_id,
                last_seq: Mutex::new(0),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.inner.sink {
            EventSink::File(path) => Some(path),
            EventSink::Discard => None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Number of rows emitted so far, including rows whose write failed.
    pub fn emitted(&self) -> u64 {
        self.inner.last_seq.lock().map(|seq| *seq).unwrap_or(0)
    }

    pub fn emit(
        &self,
        event_type: &str,
        status: &str,
        payload: EventPayload,
    ) -> anyhow::Result<Value> {
        let mut last_seq = self
            .inner
            .last_seq
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        *last_seq += 1;

        let mut row = Map::new();
        row.insert("seq".to_string(), Value::from(*last_seq));
        row.insert("ts".to_string(), Value::String(now_utc_iso()));
        row.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        row.insert("type".to_string(), Value::String(event_type.to_string()));
        row.insert("status".to_string(), Value::String(status.to_string()));
        for (key, value) in payload {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                row.insert(key, value);
            }
        }
        let row = Value::Object(row);

        if let EventSink::File(path) = &self.inner.sink {
            append_line(path, &row)
                .with_context(|| format!("failed to append event to {}", path.display()))?;
        }
        Ok(row)
    }
}

fn append_line(path: &Path, row: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(row)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
