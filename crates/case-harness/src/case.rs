// crates/case-harness/src/case.rs
// ============================================================================
// Module: Test Cases
// Description: Ordered, immutable test-case rows and their identifiers.
// Purpose: Provide typed access to raw string cells without coercing them.
// Dependencies: indexmap, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Case`] is one row of a tabular source: an insertion-ordered mapping of
//! column name to raw string value. Cells are never trimmed or converted when
//! loaded; handlers decode numbers, flags, lists, and JSON cells through the
//! accessors here so decoding failures surface as [`CaseError`] values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::orchestrator::CaseError;

// ============================================================================
// SECTION: Case Identifier
// ============================================================================

/// Human-readable case identifier.
///
/// # Invariants
/// - Not guaranteed unique; colliding identifiers are reported independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Creates an identifier from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derives the identifier for a case.
    ///
    /// Uses the `id_column` cell when present and non-empty, otherwise the
    /// positional label `Case-<position>`.
    #[must_use]
    pub fn for_case(case: &Case, id_column: &str) -> Self {
        case.non_empty(id_column)
            .map_or_else(|| Self(format!("Case-{}", case.position())), Self::new)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Case
// ============================================================================

/// One row of tabular test input.
///
/// # Invariants
/// - Column order matches the source header order.
/// - `position` is 1-based and reflects the row order in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// 1-based row position within the source.
    position: usize,
    /// Column name to raw cell value, in header order.
    values: IndexMap<String, String>,
}

impl Case {
    /// Creates a case from an ordered map of cells.
    #[must_use]
    pub const fn new(position: usize, values: IndexMap<String, String>) -> Self {
        Self {
            position,
            values,
        }
    }

    /// Creates a case from `(column, value)` pairs, preserving their order.
    #[must_use]
    pub fn from_pairs<I, K, V>(position: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        Self::new(position, values)
    }

    /// Returns the 1-based row position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the case has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates column names in header order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the raw cell for a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Returns the raw cell for a column when it is present and non-empty.
    #[must_use]
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|value| !value.is_empty())
    }

    /// Returns the raw cell for a column or fails when the column is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::MissingColumn`] when the column does not exist.
    pub fn require(&self, column: &str) -> Result<&str, CaseError> {
        self.get(column).ok_or_else(|| CaseError::MissingColumn {
            column: column.to_string(),
        })
    }

    /// Decodes a JSON-encoded cell.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::MissingColumn`] or [`CaseError::Decode`].
    pub fn json(&self, column: &str) -> Result<Value, CaseError> {
        let raw = self.require(column)?;
        serde_json::from_str(raw).map_err(|err| CaseError::Decode {
            column: column.to_string(),
            message: err.to_string(),
        })
    }

    /// Parses a cell with [`FromStr`], e.g. a numeric status code.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::MissingColumn`] or [`CaseError::Decode`].
    pub fn parse<T>(&self, column: &str) -> Result<T, CaseError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.require(column)?;
        raw.trim().parse().map_err(|err: T::Err| CaseError::Decode {
            column: column.to_string(),
            message: format!("'{raw}': {err}"),
        })
    }

    /// Parses a numeric cell.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::MissingColumn`] or [`CaseError::Decode`].
    pub fn number(&self, column: &str) -> Result<f64, CaseError> {
        self.parse(column)
    }

    /// Parses an optional `true`/`false` cell (case-insensitive).
    ///
    /// Blank or missing cells yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Decode`] for any other literal.
    pub fn flag(&self, column: &str) -> Result<Option<bool>, CaseError> {
        let Some(raw) = self.non_empty(column) else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Ok(Some(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Ok(Some(false));
        }
        Err(CaseError::Decode {
            column: column.to_string(),
            message: format!("'{raw}' is not true or false"),
        })
    }

    /// Splits a comma-separated cell into trimmed, non-empty items.
    #[must_use]
    pub fn list(&self, column: &str) -> Vec<String> {
        self.get(column)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "case_tests.rs"]
mod case_tests;
