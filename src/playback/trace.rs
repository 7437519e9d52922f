// Session tracing
// Append-only JSONL trace of playback session events

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::regime::Regime;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Something that happened during a playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        track_duration_ms: f64,
        regime_count: usize,
    },
    BoundaryCrossed {
        elapsed_ms: f64,
        boundary_ms: f64,
        regime: Regime,
    },
    Paused {
        elapsed_ms: f64,
    },
    Resumed {
        elapsed_ms: f64,
    },
    ProgramReplaced {
        elapsed_ms: f64,
        track_duration_ms: f64,
    },
    Completed {
        elapsed_ms: f64,
    },
    Stopped {
        elapsed_ms: f64,
    },
}

/// A single line in the session trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Session the event belongs to
    pub session_id: Uuid,

    pub event: SessionEvent,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(session_id: Uuid, event: SessionEvent) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            session_id,
            event,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Session trace writer
/// Manages append-only JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry to the file
    /// Creates file if it doesn't exist
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Append an event for a session
    pub fn record(&self, session_id: Uuid, event: SessionEvent) -> Result<(), TraceError> {
        self.write(&TraceEntry::new(session_id, event))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
