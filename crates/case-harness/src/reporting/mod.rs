// crates/case-harness/src/reporting/mod.rs
// ============================================================================
// Module: Reporting Sink
// Description: Best-effort reporting capability for steps, attachments, status.
// Purpose: Keep observability a side channel that never alters outcomes.
// Dependencies: serde, serde_json, thiserror, crate::log
// ============================================================================

//! ## Overview
//! A [`ReportingSink`] receives step boundaries, attachments, status, and
//! descriptions. Callers never see its errors: the [`Reporter`] facade logs
//! each failure as a `sink_error` run event and carries on. The sink is
//! discovered once per run (see [`SinkDiscovery`]) and released exactly once
//! at run end, after which every clone of the reporter is inert.
//!
//! Invariants:
//! - A wrapped step runs its future exactly once, with or without a sink.
//! - Sink failures never become case failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::log::NoopRunLog;
use crate::log::RunEvent;
use crate::log::RunLog;

// ============================================================================
// SECTION: Modules
// ============================================================================

mod discovery;

pub use discovery::AsyncSinkFactory;
pub use discovery::DiscoveryStrategy;
pub use discovery::SinkDiscovery;
pub use discovery::SinkFactory;
pub use discovery::SinkFuture;
pub use discovery::install_global_sink;
pub use discovery::uninstall_global_sink;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Status reported for steps and for the enclosing test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Completed successfully.
    Passed,
    /// Completed with an assertion failure.
    Failed,
    /// Could not complete: the handler panicked or its task was cancelled.
    Broken,
}

impl ReportStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Broken => "broken",
        }
    }
}

/// Errors emitted by reporting sinks.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SinkError {
    /// No sink could be obtained from a discovery strategy.
    #[error("reporting sink unavailable: {0}")]
    Unavailable(String),
    /// A reporting call failed.
    #[error("reporting call failed: {0}")]
    CallFailed(String),
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Reporting capability consulted as a side channel.
pub trait ReportingSink: Send + Sync {
    /// Opens a named step.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the call fails; callers discard it.
    fn start_step(&self, name: &str) -> Result<(), SinkError>;

    /// Closes the most recently opened step with a status.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the call fails; callers discard it.
    fn stop_step(&self, name: &str, status: ReportStatus) -> Result<(), SinkError>;

    /// Attaches content with a media type.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the call fails; callers discard it.
    fn attachment(&self, name: &str, content: &[u8], media_type: &str) -> Result<(), SinkError>;

    /// Sets the status of the enclosing test.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the call fails; callers discard it.
    fn status(&self, status: ReportStatus) -> Result<(), SinkError>;

    /// Sets the description of the enclosing test.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the call fails; callers discard it.
    fn description(&self, text: &str) -> Result<(), SinkError>;

    /// Flushes pending output before release.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the call fails; callers discard it.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Reporter
// ============================================================================

/// State shared by every clone of a [`Reporter`].
struct ReporterShared {
    /// Discovered sink; `None` once released or when discovery failed.
    sink: Mutex<Option<Arc<dyn ReportingSink>>>,
    /// Whether reporting calls are attempted at all.
    enabled: bool,
    /// Log receiving swallowed sink errors.
    log: Arc<dyn RunLog>,
}

/// Best-effort facade over an optional reporting sink.
#[derive(Clone)]
pub struct Reporter {
    /// Shared sink slot.
    shared: Arc<ReporterShared>,
}

impl Reporter {
    /// Creates a reporter over an optional sink.
    #[must_use]
    pub fn new(sink: Option<Arc<dyn ReportingSink>>, enabled: bool, log: Arc<dyn RunLog>) -> Self {
        Self {
            shared: Arc::new(ReporterShared {
                sink: Mutex::new(sink),
                enabled,
                log,
            }),
        }
    }

    /// Creates a reporter that never reports.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, false, Arc::new(NoopRunLog))
    }

    /// Returns true when reporting is enabled and a sink is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_sink().is_some()
    }

    /// Runs `future` inside a named step and returns its output unchanged.
    ///
    /// The step is closed as passed for `Ok` and failed for `Err`. Without an
    /// active sink the future simply runs.
    pub async fn step<F, T, E>(&self, name: &str, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let Some(sink) = self.active_sink() else {
            return future.await;
        };
        self.absorb("start_step", sink.start_step(name));
        let output = future.await;
        let status = if output.is_ok() { ReportStatus::Passed } else { ReportStatus::Failed };
        self.absorb("stop_step", sink.stop_step(name, status));
        output
    }

    /// Closes a step opened by the caller with an explicit status.
    pub fn close_step(&self, name: &str, status: ReportStatus) {
        if let Some(sink) = self.active_sink() {
            self.absorb("stop_step", sink.stop_step(name, status));
        }
    }

    /// Opens a step that the caller closes with [`Reporter::close_step`].
    pub fn open_step(&self, name: &str) {
        if let Some(sink) = self.active_sink() {
            self.absorb("start_step", sink.start_step(name));
        }
    }

    /// Attaches a value serialized as pretty JSON.
    pub fn attach_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        let Some(sink) = self.active_sink() else {
            return;
        };
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => self.absorb("attachment", sink.attachment(name, &bytes, "application/json")),
            Err(err) => self.absorb("attachment", Err(SinkError::CallFailed(err.to_string()))),
        }
    }

    /// Attaches plain text.
    pub fn attach_text(&self, name: &str, text: &str) {
        if let Some(sink) = self.active_sink() {
            self.absorb("attachment", sink.attachment(name, text.as_bytes(), "text/plain"));
        }
    }

    /// Sets the enclosing test status.
    pub fn status(&self, status: ReportStatus) {
        if let Some(sink) = self.active_sink() {
            self.absorb("status", sink.status(status));
        }
    }

    /// Sets the enclosing test description.
    pub fn description(&self, text: &str) {
        if let Some(sink) = self.active_sink() {
            self.absorb("description", sink.description(text));
        }
    }

    /// Flushes and drops the sink, resetting it to undetected.
    ///
    /// Returns true only for the call that actually released a sink.
    pub fn release(&self) -> bool {
        let taken = self.shared.sink.lock().map_or(None, |mut slot| slot.take());
        let Some(sink) = taken else {
            return false;
        };
        self.absorb("flush", sink.flush());
        true
    }

    /// Returns the sink when reporting is enabled and not yet released.
    fn active_sink(&self) -> Option<Arc<dyn ReportingSink>> {
        if !self.shared.enabled {
            return None;
        }
        self.shared.sink.lock().map_or(None, |slot| slot.clone())
    }

    /// Logs and discards a sink error.
    fn absorb(&self, operation: &str, result: Result<(), SinkError>) {
        if let Err(err) = result {
            self.shared.log.record(&RunEvent::new("sink_error").message(format!("{operation}: {err}")));
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("enabled", &self.shared.enabled)
            .field("active", &self.is_active())
            .finish()
    }
}

// ============================================================================
// SECTION: Release Guard
// ============================================================================

/// Owns a run's reporter and releases it on drop if not released explicitly.
pub struct ReporterGuard {
    /// Reporter released by this guard.
    reporter: Reporter,
    /// Whether the guard already released.
    released: bool,
}

impl ReporterGuard {
    /// Wraps a reporter for guaranteed release.
    #[must_use]
    pub const fn new(reporter: Reporter) -> Self {
        Self {
            reporter,
            released: false,
        }
    }

    /// Returns the guarded reporter.
    #[must_use]
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Releases the reporter now.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.reporter.release()
    }
}

impl Drop for ReporterGuard {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.reporter.release();
        }
    }
}
