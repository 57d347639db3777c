// crates/case-harness/src/validator.rs
// ============================================================================
// Module: Structural Validator
// Description: Recursive, path-qualified comparison of JSON values.
// Purpose: Report every structural mismatch between actual and expected shapes.
// Dependencies: serde, serde_json, crate::reporting
// ============================================================================

//! ## Overview
//! The validator walks an expected partial shape and checks the actual value
//! against it. Findings are returned as data, never raised; the handler
//! decides whether a non-empty [`ValidationOutcome`] fails its case.
//!
//! Traversal rules:
//! - Expected `null` requires actual `null`.
//! - Absent or `null` actual under a non-null expectation stops the branch.
//! - Object keys are checked in the expected object's insertion order.
//! - Arrays are validated by shape: only the first element is sampled, and
//!   only when the first expected element is an object.
//! - Primitives use strict equality; numbers compare numerically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::orchestrator::CaseError;
use crate::reporting::Reporter;

// ============================================================================
// SECTION: Outcome Types
// ============================================================================

/// One structural mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted/bracketed accessor from the compared root (e.g. `parcel.actions[0].code`).
    pub path: String,
    /// Human-readable description of the mismatch.
    pub message: String,
}

/// Ordered list of violations; empty means structurally conformant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationOutcome {
    /// Violations in traversal order.
    violations: Vec<Violation>,
}

impl ValidationOutcome {
    /// Returns the recorded violations in traversal order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns true when no violation was recorded.
    #[must_use]
    pub fn is_conformant(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns true when a violation was recorded at `path`.
    #[must_use]
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|violation| violation.path == path)
    }

    /// Appends all violations from another outcome.
    pub fn extend(&mut self, other: Self) {
        self.violations.extend(other.violations);
    }

    /// Converts a non-empty outcome into a case failure.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Validation`] when any violation was recorded.
    pub fn into_result(self) -> Result<(), CaseError> {
        if self.is_conformant() { Ok(()) } else { Err(CaseError::Validation(self)) }
    }

    /// Records a violation.
    fn push(&mut self, path: &str, message: String) {
        self.violations.push(Violation {
            path: path.to_string(),
            message,
        });
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validation failed:")?;
        for violation in &self.violations {
            write!(f, "\n- {}", violation.message)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Recursive structural comparator with an optional reporting side channel.
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    /// Reporter used to attach non-empty outcomes.
    reporter: Option<Reporter>,
}

impl StructuralValidator {
    /// Creates a validator without reporting.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reporter: None,
        }
    }

    /// Attaches non-empty outcomes to the reporter (best-effort).
    #[must_use]
    pub fn with_reporter(mut self, reporter: &Reporter) -> Self {
        self.reporter = Some(reporter.clone());
        self
    }

    /// Compares `actual` against `expected` from the root.
    #[must_use]
    pub fn compare(&self, actual: &Value, expected: &Value) -> ValidationOutcome {
        self.compare_at(Some(actual), expected, "")
    }

    /// Compares a possibly-absent `actual` against `expected`, prefixing every
    /// reported path with `root_path`.
    #[must_use]
    pub fn compare_at(
        &self,
        actual: Option<&Value>,
        expected: &Value,
        root_path: &str,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        check(actual, expected, root_path, &mut outcome);
        if !outcome.is_conformant()
            && let Some(reporter) = &self.reporter
        {
            let label = if root_path.is_empty() { "(root)" } else { root_path };
            reporter.attach_json(&format!("Structural mismatches at {label}"), &outcome);
        }
        outcome
    }
}

/// Convenience wrapper for [`StructuralValidator::compare`] without reporting.
#[must_use]
pub fn compare(actual: &Value, expected: &Value) -> ValidationOutcome {
    StructuralValidator::new().compare(actual, expected)
}

// ============================================================================
// SECTION: Traversal
// ============================================================================

/// Applies the traversal rules at one path.
fn check(actual: Option<&Value>, expected: &Value, path: &str, out: &mut ValidationOutcome) {
    if expected.is_null() {
        match actual {
            Some(Value::Null) => {}
            Some(other) => out.push(
                path,
                format!("expected '{}' to be null but got {}", display_path(path), render(other)),
            ),
            None => out.push(path, format!("missing value at {}", display_path(path))),
        }
        return;
    }
    let Some(actual) = actual.filter(|value| !value.is_null()) else {
        out.push(path, format!("missing value at {}", display_path(path)));
        return;
    };
    match expected {
        Value::Object(expected_map) => {
            let Value::Object(actual_map) = actual else {
                out.push(
                    path,
                    format!(
                        "expected '{}' to be an object but got {}",
                        display_path(path),
                        type_name(actual)
                    ),
                );
                return;
            };
            for (key, expected_value) in expected_map {
                let child = join_key(path, key);
                match actual_map.get(key) {
                    Some(actual_value) => check(Some(actual_value), expected_value, &child, out),
                    None => out.push(&child, format!("missing property '{child}'")),
                }
            }
        }
        Value::Array(expected_items) => {
            let Value::Array(actual_items) = actual else {
                out.push(
                    path,
                    format!(
                        "expected '{}' to be an array but got {}",
                        display_path(path),
                        type_name(actual)
                    ),
                );
                return;
            };
            if let (Some(first_expected @ Value::Object(_)), Some(first_actual)) =
                (expected_items.first(), actual_items.first())
            {
                check(Some(first_actual), first_expected, &format!("{path}[0]"), out);
            }
        }
        primitive => {
            if !primitive_eq(actual, primitive) {
                out.push(
                    path,
                    format!(
                        "expected '{}' to be '{}' but got '{}'",
                        display_path(path),
                        render(primitive),
                        render(actual)
                    ),
                );
            }
        }
    }
}

/// Strict primitive equality with numeric comparison for numbers.
#[allow(clippy::float_cmp, reason = "Strict equality is the contract for primitive expectations.")]
fn primitive_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                return left == right;
            }
            if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
                return left == right;
            }
            match (left.as_f64(), right.as_f64()) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            }
        }
        _ => actual == expected,
    }
}

/// Joins an object key onto a path.
fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_string() } else { format!("{path}.{key}") }
}

/// Returns a printable path label.
fn display_path(path: &str) -> &str {
    if path.is_empty() { "(root)" } else { path }
}

/// Renders a value for messages; strings are shown without quotes.
fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Returns a JSON type label.
const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
