// crates/case-harness/src/log.rs
// ============================================================================
// Module: Run Log
// Description: Structured JSON-line events for case-harness runs.
// Purpose: Emit run progress and diagnostics without affecting outcomes.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Run events are serialized as one JSON object per line. Sinks are
//! deliberately lightweight so callers can route events to stderr, a file,
//! or an in-memory collector. Write failures are swallowed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::case::CaseId;
use crate::orchestrator::RunSummary;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Run log event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunEvent {
    /// Event identifier (e.g. `case_failed`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Case source label when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Case identifier for per-case events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    /// Free-form message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Run summary for summary events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

impl RunEvent {
    /// Creates an event with a consistent timestamp and no payload.
    #[must_use]
    pub fn new(event: &'static str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            origin: None,
            case_id: None,
            message: None,
            summary: None,
        }
    }

    /// Sets the source label.
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the case identifier.
    #[must_use]
    pub fn case(mut self, case_id: &CaseId) -> Self {
        self.case_id = Some(case_id.clone());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the run summary.
    #[must_use]
    pub const fn summary(mut self, summary: RunSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for run events.
pub trait RunLog: Send + Sync {
    /// Records an event. Implementations must not panic or block for long.
    fn record(&self, event: &RunEvent);
}

/// Run log that discards every event.
pub struct NoopRunLog;

impl RunLog for NoopRunLog {
    fn record(&self, _event: &RunEvent) {}
}

/// Run log that writes JSON lines to stderr.
pub struct StderrRunLog;

impl RunLog for StderrRunLog {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Run log that appends JSON lines to a file.
pub struct FileRunLog {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileRunLog {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RunLog for FileRunLog {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}
