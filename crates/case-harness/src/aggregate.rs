// crates/case-harness/src/aggregate.rs
// ============================================================================
// Module: Result Aggregation
// Description: Folds per-case results into a single pass/fail verdict.
// Purpose: Surface every failing case in one error for the enclosing test.
// Dependencies: serde, serde_json, thiserror, crate::{orchestrator, reporting}
// ============================================================================

//! ## Overview
//! [`aggregate`] is silent when every case passed and otherwise returns one
//! [`AggregateFailure`] enumerating each failing case id and message in case
//! order. [`run_and_record`] is the usual entry point for a test: one sink
//! discovery, one run, one aggregation, one release.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

use crate::case::CaseId;
use crate::log::RunEvent;
use crate::orchestrator::CaseHandler;
use crate::orchestrator::CaseResult;
use crate::orchestrator::Orchestrator;
use crate::orchestrator::RunError;
use crate::orchestrator::RunSummary;
use crate::reporting::ReportStatus;
use crate::reporting::Reporter;
use crate::reporting::ReporterGuard;
use crate::source::CaseSource;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A failing case as listed in an aggregate failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCase {
    /// Case identifier.
    pub id: CaseId,
    /// Captured error message.
    pub error: String,
}

/// Single error representing every case failure of a run.
///
/// # Invariants
/// - `failures` is non-empty and in case order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AggregateFailure {
    /// Failing cases in case order.
    failures: Vec<FailedCase>,
    /// Rendered message.
    message: String,
}

impl AggregateFailure {
    /// Collects the failing results; `None` when every case passed.
    #[must_use]
    pub fn from_results<T>(results: &[CaseResult<T>]) -> Option<Self> {
        let failures: Vec<FailedCase> = results
            .iter()
            .filter_map(|result| {
                result.error().map(|error| FailedCase {
                    id: result.id.clone(),
                    error: error.to_string(),
                })
            })
            .collect();
        if failures.is_empty() {
            return None;
        }
        let message = render(&failures);
        Some(Self {
            failures,
            message,
        })
    }

    /// Returns the failing cases in case order.
    #[must_use]
    pub fn failures(&self) -> &[FailedCase] {
        &self.failures
    }

    /// Returns true when `id` is among the failing cases.
    #[must_use]
    pub fn mentions(&self, id: &str) -> bool {
        self.failures.iter().any(|failure| failure.id.as_str() == id)
    }
}

/// Errors returned by [`run_and_record`].
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RecordError {
    /// One or more cases failed.
    #[error(transparent)]
    Failed(#[from] AggregateFailure),
    /// The run itself could not complete.
    #[error("Test execution error: {0}")]
    Execution(#[from] RunError),
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Returns `Ok` when every case passed, otherwise one [`AggregateFailure`].
///
/// The failure is attached to the reporter before returning.
///
/// # Errors
///
/// Returns [`AggregateFailure`] listing every failing case.
pub fn aggregate<T>(results: &[CaseResult<T>], reporter: &Reporter) -> Result<(), AggregateFailure> {
    let Some(failure) = AggregateFailure::from_results(results) else {
        return Ok(());
    };
    reporter.attach_json("Failed test cases", failure.failures());
    reporter.status(ReportStatus::Failed);
    Err(failure)
}

/// Loads, runs and aggregates a source in one guarded reporting session.
///
/// # Errors
///
/// Returns [`RecordError::Failed`] when any case failed and
/// [`RecordError::Execution`] when the run could not complete.
pub async fn run_and_record<S, H>(
    orchestrator: &Orchestrator,
    source: &S,
    handler: H,
) -> Result<RunSummary, RecordError>
where
    S: CaseSource + ?Sized,
    H: CaseHandler,
{
    let guard = ReporterGuard::new(orchestrator.discover_reporter().await);
    let outcome = match orchestrator.run_source_with_reporter(guard.reporter(), source, handler).await
    {
        Ok(results) => aggregate(&results, guard.reporter())
            .map(|()| RunSummary::from_results(&results))
            .map_err(RecordError::from),
        Err(err) => Err(RecordError::Execution(err)),
    };
    if let Err(err) = &outcome {
        orchestrator.log().record(
            &RunEvent::new("aggregate_failure").origin(source.origin()).message(err.to_string()),
        );
    }
    guard.release();
    outcome
}

/// Renders `<n> test cases failed: <ids>` followed by one indented line per case.
fn render(failures: &[FailedCase]) -> String {
    let ids: Vec<&str> = failures.iter().map(|failure| failure.id.as_str()).collect();
    let mut message = format!("{} test cases failed: {}", failures.len(), ids.join(", "));
    for failure in failures {
        let _ = write!(message, "\n  {}: {}", failure.id, failure.error);
    }
    message
}
