// crates/case-harness/src/lib.rs
// ============================================================================
// Module: Case Harness Library
// Description: Public API surface for the data-driven case harness.
// Purpose: Expose case loading, validation, orchestration, and reporting.
// Dependencies: crate::{case, source, expectation, validator, reporting, log, orchestrator, aggregate}
// ============================================================================

//! ## Overview
//! The case harness drives a caller-supplied handler over an ordered sequence
//! of tabular test cases, records every outcome without aborting the run, and
//! folds the outcomes into a single pass/fail verdict. Reporting is a
//! best-effort side channel and never changes an outcome.
//!
//! Invariants:
//! - Cases execute strictly sequentially in source order.
//! - Case-level failures are recorded as data; only the aggregate escalates.
//! - The reporting sink is discovered at most once per run and released
//!   exactly once.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aggregate;
pub mod case;
pub mod expectation;
pub mod log;
pub mod orchestrator;
pub mod reporting;
pub mod source;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::AggregateFailure;
pub use aggregate::FailedCase;
pub use aggregate::RecordError;
pub use aggregate::aggregate;
pub use aggregate::run_and_record;
pub use case::Case;
pub use case::CaseId;
pub use expectation::CellType;
pub use expectation::ExpectationDecoder;
pub use expectation::ExpectationError;
pub use log::FileRunLog;
pub use log::NoopRunLog;
pub use log::RunEvent;
pub use log::RunLog;
pub use log::StderrRunLog;
pub use orchestrator::CaseContext;
pub use orchestrator::CaseError;
pub use orchestrator::CaseHandler;
pub use orchestrator::CaseOutcome;
pub use orchestrator::CaseResult;
pub use orchestrator::DEFAULT_ID_COLUMN;
pub use orchestrator::FnHandler;
pub use orchestrator::Orchestrator;
pub use orchestrator::RunError;
pub use orchestrator::RunOptions;
pub use orchestrator::RunSummary;
pub use orchestrator::handler_fn;
pub use reporting::ReportStatus;
pub use reporting::Reporter;
pub use reporting::ReporterGuard;
pub use reporting::ReportingSink;
pub use reporting::SinkDiscovery;
pub use reporting::SinkError;
pub use reporting::install_global_sink;
pub use reporting::uninstall_global_sink;
pub use source::CaseSource;
pub use source::CsvCaseSource;
pub use source::InMemoryCaseSource;
pub use source::SourceError;
pub use source::parse_cases;
pub use validator::StructuralValidator;
pub use validator::ValidationOutcome;
pub use validator::Violation;
pub use validator::compare;
