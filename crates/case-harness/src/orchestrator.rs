// crates/case-harness/src/orchestrator.rs
// ============================================================================
// Module: Case Orchestrator
// Description: Sequential execution of a handler over an ordered case sequence.
// Purpose: Isolate per-case failures and summarize every run exit path.
// Dependencies: async-trait, serde, thiserror, tokio, crate::{case, source, reporting, log}
// ============================================================================

//! ## Overview
//! The orchestrator runs a [`CaseHandler`] over each case strictly in source
//! order, awaiting each case (and its reporting step) before starting the
//! next. Handler errors and panics are captured into [`CaseResult`] values;
//! only an empty source, a load failure, or a `stop_on_error` abort ends a
//! run early.
//!
//! Invariants:
//! - Without `stop_on_error`, N cases yield exactly N results in source order.
//! - With `stop_on_error`, a failure at case k ends the run after k cases.
//! - A run summary is logged on every exit path, and a run-owned reporter is
//!   released exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;

use crate::case::Case;
use crate::case::CaseId;
use crate::expectation::ExpectationError;
use crate::log::RunEvent;
use crate::log::RunLog;
use crate::log::StderrRunLog;
use crate::reporting::ReportStatus;
use crate::reporting::Reporter;
use crate::reporting::ReporterGuard;
use crate::reporting::SinkDiscovery;
use crate::source::CaseSource;
use crate::source::SourceError;
use crate::validator::ValidationOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default column holding the human-readable case description.
pub const DEFAULT_ID_COLUMN: &str = "TestDescription";

/// Origin label used when cases are supplied directly.
const DIRECT_ORIGIN: &str = "supplied cases";

// ============================================================================
// SECTION: Options
// ============================================================================

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Emit per-case progress events.
    pub verbose: bool,
    /// Stop the run after the first failing case.
    pub stop_on_error: bool,
    /// Attempt best-effort reporting calls at all.
    pub report: bool,
    /// Column used to derive case identifiers.
    pub id_column: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            stop_on_error: false,
            report: true,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }
}

impl RunOptions {
    /// Sets verbose progress logging.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets stop-on-first-failure.
    #[must_use]
    pub const fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    /// Enables or disables reporting calls.
    #[must_use]
    pub const fn report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    /// Sets the identifier column.
    #[must_use]
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure of a single case, captured into its [`CaseResult`].
#[derive(Debug, Error)]
pub enum CaseError {
    /// A required column is absent from the case.
    #[error("missing column '{column}'")]
    MissingColumn {
        /// Column name.
        column: String,
    },
    /// A cell could not be decoded.
    #[error("column '{column}' could not be decoded: {message}")]
    Decode {
        /// Column name.
        column: String,
        /// Decoder message.
        message: String,
    },
    /// A domain assertion failed.
    #[error("{0}")]
    Assertion(String),
    /// Structural validation recorded mismatches.
    #[error("{0}")]
    Validation(ValidationOutcome),
    /// Flat expectation columns could not be decoded.
    #[error(transparent)]
    Expectation(#[from] ExpectationError),
    /// The request could not be issued or its response read.
    #[error("request failed: {0}")]
    Transport(String),
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
    /// The handler task was cancelled before completing.
    #[error("handler task cancelled")]
    Cancelled,
}

impl CaseError {
    /// Creates an assertion failure.
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Cases could not be loaded.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The source yielded zero cases.
    #[error("No test cases found in {origin}")]
    EmptySource {
        /// Source label.
        origin: String,
    },
    /// `stop_on_error` halted the run after a failing case.
    #[error("Test execution stopped after failure in test case: {case_id}")]
    Aborted {
        /// Identifier of the failing case.
        case_id: CaseId,
        /// Summary of the cases executed before stopping.
        summary: RunSummary,
    },
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of one case: exactly one of payload or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CaseOutcome<T> {
    /// The handler returned a payload.
    Passed(T),
    /// The handler failed with a message.
    Failed(String),
}

/// Result recorded for one executed case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult<T> {
    /// Case identifier.
    pub id: CaseId,
    /// Case outcome.
    pub outcome: CaseOutcome<T>,
}

impl<T> CaseResult<T> {
    /// Creates a passing result.
    #[must_use]
    pub const fn passed(id: CaseId, payload: T) -> Self {
        Self {
            id,
            outcome: CaseOutcome::Passed(payload),
        }
    }

    /// Creates a failing result.
    #[must_use]
    pub fn failed(id: CaseId, error: impl Into<String>) -> Self {
        Self {
            id,
            outcome: CaseOutcome::Failed(error.into()),
        }
    }

    /// Returns true for passing results.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Passed(_))
    }

    /// Returns the handler payload for passing results.
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        match &self.outcome {
            CaseOutcome::Passed(payload) => Some(payload),
            CaseOutcome::Failed(_) => None,
        }
    }

    /// Returns the error message for failing results.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CaseOutcome::Passed(_) => None,
            CaseOutcome::Failed(message) => Some(message),
        }
    }
}

/// Counts over the executed cases of a run.
///
/// # Invariants
/// - `passed + failed == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Executed cases.
    pub total: usize,
    /// Passing cases.
    pub passed: usize,
    /// Failing cases.
    pub failed: usize,
}

impl RunSummary {
    /// Summarizes a result sequence.
    #[must_use]
    pub fn from_results<T>(results: &[CaseResult<T>]) -> Self {
        let failed = results.iter().filter(|result| !result.is_success()).count();
        Self {
            total: results.len(),
            passed: results.len() - failed,
            failed,
        }
    }
}

// ============================================================================
// SECTION: Handler Contract
// ============================================================================

/// Per-case context handed to handlers.
#[derive(Debug, Clone)]
pub struct CaseContext {
    /// Run options.
    options: RunOptions,
    /// Identifier of the case being executed.
    case_id: CaseId,
    /// Run reporter (best-effort).
    reporter: Reporter,
}

impl CaseContext {
    /// Creates a context.
    #[must_use]
    pub const fn new(options: RunOptions, case_id: CaseId, reporter: Reporter) -> Self {
        Self {
            options,
            case_id,
            reporter,
        }
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Returns the case identifier.
    #[must_use]
    pub const fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    /// Returns the run reporter.
    #[must_use]
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

/// Domain-specific logic executed for each case.
#[async_trait]
pub trait CaseHandler: Send + Sync + 'static {
    /// Payload recorded for passing cases.
    type Output: Send + 'static;

    /// Executes one case.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError`] to mark the case as failed.
    async fn handle(&self, case: &Case, ctx: &CaseContext) -> Result<Self::Output, CaseError>;
}

#[async_trait]
impl<H: CaseHandler> CaseHandler for Arc<H> {
    type Output = H::Output;

    async fn handle(&self, case: &Case, ctx: &CaseContext) -> Result<Self::Output, CaseError> {
        self.as_ref().handle(case, ctx).await
    }
}

/// Handler built from a closure; see [`handler_fn`].
pub struct FnHandler<F> {
    /// Wrapped closure.
    f: F,
}

/// Adapts a closure taking owned case and context into a [`CaseHandler`].
#[must_use]
pub fn handler_fn<F, Fut, T>(f: F) -> FnHandler<F>
where
    F: Fn(Case, CaseContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CaseError>> + Send + 'static,
    T: Send + 'static,
{
    FnHandler {
        f,
    }
}

#[async_trait]
impl<F, Fut, T> CaseHandler for FnHandler<F>
where
    F: Fn(Case, CaseContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CaseError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn handle(&self, case: &Case, ctx: &CaseContext) -> Result<T, CaseError> {
        (self.f)(case.clone(), ctx.clone()).await
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Sequential case runner.
pub struct Orchestrator {
    /// Run options.
    options: RunOptions,
    /// Reporting sink discovery, consulted once per run.
    discovery: SinkDiscovery,
    /// Run log.
    log: Arc<dyn RunLog>,
}

impl Orchestrator {
    /// Creates an orchestrator with standard discovery and a stderr run log.
    #[must_use]
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            discovery: SinkDiscovery::standard(),
            log: Arc::new(StderrRunLog),
        }
    }

    /// Replaces the sink discovery.
    #[must_use]
    pub fn with_discovery(mut self, discovery: SinkDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Replaces the run log.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn RunLog>) -> Self {
        self.log = log;
        self
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Returns the run log.
    #[must_use]
    pub fn log(&self) -> Arc<dyn RunLog> {
        Arc::clone(&self.log)
    }

    /// Discovers the reporting sink for a new run.
    pub async fn discover_reporter(&self) -> Reporter {
        self.discovery.discover(self.options.report, Arc::clone(&self.log)).await
    }

    /// Runs `handler` over `cases`, owning the reporter for the run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::EmptySource`] for an empty sequence and
    /// [`RunError::Aborted`] when `stop_on_error` halts the run.
    pub async fn run<H: CaseHandler>(
        &self,
        cases: Vec<Case>,
        handler: H,
    ) -> Result<Vec<CaseResult<H::Output>>, RunError> {
        let guard = ReporterGuard::new(self.discover_reporter().await);
        let result = self.run_with_reporter(guard.reporter(), DIRECT_ORIGIN, cases, handler).await;
        guard.release();
        result
    }

    /// Loads cases from `source` and runs `handler`, owning the reporter.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Source`] when loading fails, plus the errors of
    /// [`Orchestrator::run`].
    pub async fn run_source<S, H>(
        &self,
        source: &S,
        handler: H,
    ) -> Result<Vec<CaseResult<H::Output>>, RunError>
    where
        S: CaseSource + ?Sized,
        H: CaseHandler,
    {
        let guard = ReporterGuard::new(self.discover_reporter().await);
        let result = self.run_source_with_reporter(guard.reporter(), source, handler).await;
        guard.release();
        result
    }

    /// Loads and runs against a caller-owned reporter; the caller releases it.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run_source`].
    pub async fn run_source_with_reporter<S, H>(
        &self,
        reporter: &Reporter,
        source: &S,
        handler: H,
    ) -> Result<Vec<CaseResult<H::Output>>, RunError>
    where
        S: CaseSource + ?Sized,
        H: CaseHandler,
    {
        let origin = source.origin();
        self.log.record(&RunEvent::new("run_started").origin(origin.as_str()));
        match source.load() {
            Ok(cases) => self.run_cases(reporter, &origin, cases, handler).await,
            Err(err) => {
                let err = RunError::Source(err);
                self.finish(reporter, &origin, RunSummary::default(), Some(&err));
                Err(err)
            }
        }
    }

    /// Runs against a caller-owned reporter; the caller releases it.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run`].
    pub async fn run_with_reporter<H: CaseHandler>(
        &self,
        reporter: &Reporter,
        origin: &str,
        cases: Vec<Case>,
        handler: H,
    ) -> Result<Vec<CaseResult<H::Output>>, RunError> {
        self.log.record(&RunEvent::new("run_started").origin(origin));
        self.run_cases(reporter, origin, cases, handler).await
    }

    /// Executes loaded cases in order and summarizes the run.
    async fn run_cases<H: CaseHandler>(
        &self,
        reporter: &Reporter,
        origin: &str,
        cases: Vec<Case>,
        handler: H,
    ) -> Result<Vec<CaseResult<H::Output>>, RunError> {
        if cases.is_empty() {
            let err = RunError::EmptySource {
                origin: origin.to_string(),
            };
            self.finish(reporter, origin, RunSummary::default(), Some(&err));
            return Err(err);
        }
        self.log.record(
            &RunEvent::new("cases_loaded")
                .origin(origin)
                .message(format!("Read {} records", cases.len())),
        );
        reporter.description(&format!("Running {} test cases from {origin}", cases.len()));

        let handler = Arc::new(handler);
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let case_id = CaseId::for_case(&case, &self.options.id_column);
            if self.options.verbose {
                self.log.record(&RunEvent::new("case_started").case(&case_id));
            }
            match self.execute(&handler, case, &case_id, reporter).await {
                Ok(payload) => {
                    if self.options.verbose {
                        self.log.record(&RunEvent::new("case_passed").case(&case_id));
                    }
                    results.push(CaseResult::passed(case_id, payload));
                }
                Err(err) => {
                    let message = err.to_string();
                    self.log.record(
                        &RunEvent::new("case_failed").case(&case_id).message(message.clone()),
                    );
                    reporter.attach_json(
                        &format!("Error in test: {case_id}"),
                        &json!({ "error": message }),
                    );
                    reporter.status(case_status(&err));
                    results.push(CaseResult::failed(case_id.clone(), message));
                    if self.options.stop_on_error {
                        let summary = RunSummary::from_results(&results);
                        let err = RunError::Aborted {
                            case_id,
                            summary,
                        };
                        self.finish(reporter, origin, summary, Some(&err));
                        return Err(err);
                    }
                }
            }
        }
        self.finish(reporter, origin, RunSummary::from_results(&results), None);
        Ok(results)
    }

    /// Executes one case in its own task inside a reporting step.
    async fn execute<H: CaseHandler>(
        &self,
        handler: &Arc<H>,
        case: Case,
        case_id: &CaseId,
        reporter: &Reporter,
    ) -> Result<H::Output, CaseError> {
        let ctx = CaseContext::new(self.options.clone(), case_id.clone(), reporter.clone());
        let handler = Arc::clone(handler);
        reporter
            .step(&format!("Test case: {case_id}"), async move {
                // Spawned inside the step so nested reporting lands under it.
                let task = tokio::spawn(async move { handler.handle(&case, &ctx).await });
                match task.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(join_failure(err)),
                }
            })
            .await
    }

    /// Logs and reports the run summary for any exit path.
    fn finish(
        &self,
        reporter: &Reporter,
        origin: &str,
        summary: RunSummary,
        critical: Option<&RunError>,
    ) {
        if let Some(err) = critical {
            self.log.record(&RunEvent::new("run_failed").origin(origin).message(err.to_string()));
            reporter.attach_json("Critical error", &json!({ "error": err.to_string() }));
        }
        self.log.record(&RunEvent::new("run_summary").origin(origin).summary(summary));
        reporter.attach_json("Test Summary", &summary);
        let status = if critical.is_none() && summary.failed == 0 {
            ReportStatus::Passed
        } else {
            ReportStatus::Failed
        };
        reporter.status(status);
    }
}

/// Status reported for a failed case; panics and cancellations are broken.
fn case_status(err: &CaseError) -> ReportStatus {
    match err {
        CaseError::Panicked(_) | CaseError::Cancelled => ReportStatus::Broken,
        _ => ReportStatus::Failed,
    }
}

/// Converts a task join failure into a case failure.
fn join_failure(err: JoinError) -> CaseError {
    if !err.is_panic() {
        return CaseError::Cancelled;
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    CaseError::Panicked(message)
}
