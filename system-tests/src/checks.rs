// system-tests/src/checks.rs
// ============================================================================
// Module: Response Checks
// Description: Column-driven assertions over captured API responses.
// Purpose: Share status, message, content-type, and lookup checks across handlers.
// Dependencies: case-harness, serde_json
// ============================================================================

//! ## Overview
//! Each check reads its expectation from a case column and returns
//! [`CaseError::Assertion`] with a human message on mismatch. Blank
//! expectation cells skip the check, except the status code which defaults
//! to 200.

// ============================================================================
// SECTION: Imports
// ============================================================================

use case_harness::Case;
use case_harness::CaseError;
use serde_json::Value;

use crate::client::ApiResponse;

// ============================================================================
// SECTION: Columns
// ============================================================================

/// Column holding the expected HTTP status.
pub const EXPECTED_STATUS: &str = "expectedStatusCode";
/// Column holding the expected top-level message.
pub const EXPECTED_MESSAGE: &str = "expectedMessage";
/// Column holding the expected content type fragment.
pub const EXPECTED_CONTENT_TYPE: &str = "expectedContentType";
/// Column that disables the default content-type check.
pub const SKIP_CONTENT_TYPE: &str = "skipContentTypeCheck";

/// Status expected when the status column is blank or absent.
pub const DEFAULT_STATUS: u16 = 200;
/// Content type expected of successful responses by default.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Status and Message
// ============================================================================

/// Reads the expected status from `column`, defaulting to 200.
///
/// # Errors
///
/// Returns [`CaseError::Decode`] when the cell is not a status code.
pub fn expected_status(case: &Case, column: &str) -> Result<u16, CaseError> {
    if case.non_empty(column).is_none() {
        return Ok(DEFAULT_STATUS);
    }
    case.parse(column)
}

/// Asserts the response status against `column`.
///
/// # Errors
///
/// Returns [`CaseError::Assertion`] on mismatch.
pub fn expect_status(response: &ApiResponse, case: &Case, column: &str) -> Result<(), CaseError> {
    let expected = expected_status(case, column)?;
    if response.status == expected {
        return Ok(());
    }
    Err(CaseError::assertion(format!("Expected status {expected} but got {}", response.status)))
}

/// Asserts the top-level success message against `column`.
///
/// # Errors
///
/// Returns [`CaseError::Assertion`] on mismatch.
pub fn expect_message(response: &ApiResponse, case: &Case, column: &str) -> Result<(), CaseError> {
    compare_message(response, case, column, "Message validation failed")
}

/// Asserts the top-level error message against `column`.
///
/// # Errors
///
/// Returns [`CaseError::Assertion`] on mismatch.
pub fn expect_error_message(
    response: &ApiResponse,
    case: &Case,
    column: &str,
) -> Result<(), CaseError> {
    compare_message(response, case, column, "Error message validation failed")
}

/// Compares the body message with a non-blank expectation cell.
fn compare_message(
    response: &ApiResponse,
    case: &Case,
    column: &str,
    label: &str,
) -> Result<(), CaseError> {
    let Some(expected) = case.non_empty(column) else {
        return Ok(());
    };
    let actual = response.message().unwrap_or_default();
    if actual == expected {
        return Ok(());
    }
    Err(CaseError::assertion(format!("{label}: expected '{expected}' but got '{actual}'")))
}

// ============================================================================
// SECTION: Content Type
// ============================================================================

/// Asserts the response content type.
///
/// An explicit `expectedContentType` cell must be contained in the header.
/// Otherwise successful responses must be JSON unless `skipContentTypeCheck`
/// is true.
///
/// # Errors
///
/// Returns [`CaseError::Assertion`] on mismatch or [`CaseError::Decode`] for an
/// invalid skip flag.
pub fn expect_content_type(response: &ApiResponse, case: &Case) -> Result<(), CaseError> {
    let expected = match case.non_empty(EXPECTED_CONTENT_TYPE) {
        Some(explicit) => explicit,
        None if response.is_success() && case.flag(SKIP_CONTENT_TYPE)? != Some(true) => {
            DEFAULT_CONTENT_TYPE
        }
        None => return Ok(()),
    };
    let actual = response.content_type.as_deref().unwrap_or_default();
    if actual.contains(expected) {
        return Ok(());
    }
    Err(CaseError::assertion(format!(
        "Expected content-type to include '{expected}' but got '{actual}'"
    )))
}

// ============================================================================
// SECTION: Collections
// ============================================================================

/// Asserts a collection length against an optional count column.
///
/// # Errors
///
/// Returns [`CaseError::Decode`] for an invalid count cell or
/// [`CaseError::Assertion`] on mismatch.
pub fn expect_count(case: &Case, column: &str, actual: usize, label: &str) -> Result<(), CaseError> {
    if case.non_empty(column).is_none() {
        return Ok(());
    }
    let expected: usize = case.parse(column)?;
    if expected == actual {
        return Ok(());
    }
    Err(CaseError::assertion(format!("Expected {expected} {label} but got {actual}")))
}

/// Returns the array under `field`, or an empty slice when absent.
#[must_use]
pub fn array_field<'a>(value: &'a Value, field: &str) -> &'a [Value] {
    value.get(field).and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

/// Renders a JSON scalar for messages without surrounding quotes.
#[must_use]
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Finds a parcel by sheet and parcel identifier in a parcels response.
///
/// # Errors
///
/// Returns [`CaseError::Assertion`] listing the returned parcels when none
/// matches.
pub fn find_parcel<'a>(
    body: &'a Value,
    sheet_id: &str,
    parcel_id: &str,
) -> Result<&'a Value, CaseError> {
    let parcels = array_field(body, "parcels");
    let matches = |parcel: &&Value| {
        parcel.get("sheetId").map(scalar_text).as_deref() == Some(sheet_id)
            && parcel.get("parcelId").map(scalar_text).as_deref() == Some(parcel_id)
    };
    if let Some(parcel) = parcels.iter().find(matches) {
        return Ok(parcel);
    }
    let found: Vec<String> = parcels
        .iter()
        .map(|parcel| {
            format!(
                "{}-{}",
                parcel.get("sheetId").map(scalar_text).unwrap_or_default(),
                parcel.get("parcelId").map(scalar_text).unwrap_or_default()
            )
        })
        .collect();
    Err(CaseError::assertion(format!(
        "SheetId and parcelId validation failed: expected '{sheet_id}-{parcel_id}' but found: [{}]",
        found.join(", ")
    )))
}

#[cfg(test)]
#[path = "checks_tests.rs"]
mod checks_tests;
