// system-tests/src/response.rs
// ============================================================================
// Module: Response Validator
// Description: Staged validation of an API response against case columns.
// Purpose: Collect every failing stage into one validation error.
// Dependencies: case-harness, serde_json
// ============================================================================

//! ## Overview
//! [`ResponseValidator`] runs named stages in a fixed order: status code,
//! content type, message, response body, then custom checks. Each stage runs
//! inside a reporting step. Failures do not stop later stages; they are
//! collected and returned as one `Validation failed:` assertion with one
//! `- [Stage] message` line per failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use case_harness::Case;
use case_harness::CaseError;
use case_harness::ReportStatus;
use case_harness::Reporter;
use case_harness::StructuralValidator;

use crate::checks;
use crate::client::ApiResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Column holding the expected response body as JSON.
pub const EXPECTED_BODY: &str = "expectedBody";

/// Stage asserting the HTTP status.
pub const STAGE_STATUS: &str = "Status Code";
/// Stage asserting the content type.
pub const STAGE_CONTENT_TYPE: &str = "Content Type";
/// Stage asserting the top-level message.
pub const STAGE_MESSAGE: &str = "Message";
/// Stage comparing the body structurally.
pub const STAGE_BODY: &str = "Response Body";
/// Stage running caller-supplied checks.
pub const STAGE_CUSTOM: &str = "Custom Validators";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Caller-supplied response check.
pub type CustomCheck = Arc<dyn Fn(&ApiResponse, &Case) -> Result<(), CaseError> + Send + Sync>;

/// Staged response validator.
#[derive(Clone)]
pub struct ResponseValidator {
    /// Column holding the expected status.
    status_column: String,
    /// Run the content-type stage.
    content_type: bool,
    /// Run the message stage.
    message: bool,
    /// Run the response-body stage.
    body: bool,
    /// Named custom checks, run in insertion order.
    custom: Vec<(String, CustomCheck)>,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self {
            status_column: checks::EXPECTED_STATUS.to_string(),
            content_type: true,
            message: true,
            body: true,
            custom: Vec::new(),
        }
    }
}

impl ResponseValidator {
    /// Creates a validator with every built-in stage enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the expected status from another column.
    #[must_use]
    pub fn status_column(mut self, column: impl Into<String>) -> Self {
        self.status_column = column.into();
        self
    }

    /// Enables or disables the content-type stage.
    #[must_use]
    pub const fn content_type(mut self, enabled: bool) -> Self {
        self.content_type = enabled;
        self
    }

    /// Enables or disables the message stage.
    #[must_use]
    pub const fn message(mut self, enabled: bool) -> Self {
        self.message = enabled;
        self
    }

    /// Enables or disables the response-body stage.
    #[must_use]
    pub const fn body(mut self, enabled: bool) -> Self {
        self.body = enabled;
        self
    }

    /// Adds a named custom check.
    #[must_use]
    pub fn with_check<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ApiResponse, &Case) -> Result<(), CaseError> + Send + Sync + 'static,
    {
        self.custom.push((name.into(), Arc::new(check)));
        self
    }

    /// Validates `response` against the expectations in `case`.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Assertion`] listing every failed stage.
    pub fn validate(
        &self,
        response: &ApiResponse,
        case: &Case,
        reporter: &Reporter,
    ) -> Result<(), CaseError> {
        let mut failures = Vec::new();
        run_stage(reporter, STAGE_STATUS, &mut failures, || {
            checks::expect_status(response, case, &self.status_column)
        });
        if self.content_type {
            run_stage(reporter, STAGE_CONTENT_TYPE, &mut failures, || {
                checks::expect_content_type(response, case)
            });
        }
        if self.message {
            run_stage(reporter, STAGE_MESSAGE, &mut failures, || check_message(response, case));
        }
        if self.body {
            run_stage(reporter, STAGE_BODY, &mut failures, || check_body(response, case, reporter));
        }
        if !self.custom.is_empty() {
            run_stage(reporter, STAGE_CUSTOM, &mut failures, || self.run_custom(response, case));
        }
        if failures.is_empty() {
            return Ok(());
        }
        Err(CaseError::assertion(format!("Validation failed:\n{}", failures.join("\n"))))
    }

    /// Runs every custom check, joining their failures.
    fn run_custom(&self, response: &ApiResponse, case: &Case) -> Result<(), CaseError> {
        let errors: Vec<String> = self
            .custom
            .iter()
            .filter_map(|(name, check)| check(response, case).err().map(|err| format!("{name}: {err}")))
            .collect();
        if errors.is_empty() {
            return Ok(());
        }
        Err(CaseError::assertion(errors.join("; ")))
    }
}

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Runs one stage inside a reporting step and records its failure.
fn run_stage<F>(reporter: &Reporter, name: &str, failures: &mut Vec<String>, stage: F)
where
    F: FnOnce() -> Result<(), CaseError>,
{
    reporter.open_step(name);
    match stage() {
        Ok(()) => reporter.close_step(name, ReportStatus::Passed),
        Err(err) => {
            let message = err.to_string();
            reporter.attach_text(&format!("Error in {name}"), &message);
            reporter.close_step(name, ReportStatus::Failed);
            failures.push(format!("- [{name}] {message}"));
        }
    }
}

/// Compares the body message with a non-blank `expectedMessage` cell.
fn check_message(response: &ApiResponse, case: &Case) -> Result<(), CaseError> {
    let Some(expected) = case.non_empty(checks::EXPECTED_MESSAGE) else {
        return Ok(());
    };
    let actual = response.message().unwrap_or_default();
    if actual == expected {
        return Ok(());
    }
    Err(CaseError::assertion(format!("Expected message '{expected}' but got '{actual}'")))
}

/// Compares the body structurally with a non-blank `expectedBody` cell.
fn check_body(response: &ApiResponse, case: &Case, reporter: &Reporter) -> Result<(), CaseError> {
    if case.non_empty(EXPECTED_BODY).is_none() {
        return Ok(());
    }
    let expected = case.json(EXPECTED_BODY)?;
    let outcome = StructuralValidator::new().with_reporter(reporter).compare(&response.body, &expected);
    if outcome.is_conformant() {
        return Ok(());
    }
    let messages: Vec<&str> =
        outcome.violations().iter().map(|violation| violation.message.as_str()).collect();
    Err(CaseError::assertion(format!("Body validation failed: {}", messages.join("; "))))
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod response_tests;
