// crates/case-harness/src/source.rs
// ============================================================================
// Module: Case Sources
// Description: Loaders that turn tabular files into ordered case sequences.
// Purpose: Keep one unambiguous loading contract: headers + raw string cells.
// Dependencies: csv, indexmap, thiserror
// ============================================================================

//! ## Overview
//! A [`CaseSource`] yields an ordered sequence of [`Case`] rows. The CSV
//! source reads a UTF-8, comma-separated file whose first row names the
//! columns; every subsequent row becomes one case with all cells kept as raw
//! strings. Whether an empty sequence is an error is decided by the
//! orchestrator, not the source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use csv::ReaderBuilder;
use csv::Trim;
use indexmap::IndexMap;
use thiserror::Error;

use crate::case::Case;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading cases.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The path does not resolve to a readable file.
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },
    /// The file exists but could not be parsed as CSV.
    #[error("failed to read cases from {origin}: {source}")]
    Read {
        /// Human-readable source label.
        origin: String,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

// ============================================================================
// SECTION: Source Trait
// ============================================================================

/// Loads an ordered sequence of cases.
pub trait CaseSource: Send + Sync {
    /// Returns a human-readable label for the source (typically its path).
    fn origin(&self) -> String;

    /// Loads every case in source order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the source is missing or malformed.
    fn load(&self) -> Result<Vec<Case>, SourceError>;
}

// ============================================================================
// SECTION: CSV Source
// ============================================================================

/// CSV file-backed case source.
#[derive(Debug, Clone)]
pub struct CsvCaseSource {
    /// Path to the CSV file.
    path: PathBuf,
}

impl CsvCaseSource {
    /// Creates a source for the CSV file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the configured path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaseSource for CsvCaseSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<Case>, SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::NotFound {
                path: self.path.clone(),
            });
        }
        let file = File::open(&self.path).map_err(|_| SourceError::NotFound {
            path: self.path.clone(),
        })?;
        parse_cases(file, &self.origin())
    }
}

/// Parses CSV text from any reader into cases.
///
/// The first record is the header row. Cells are neither trimmed nor
/// type-converted, and every row must have the header's width.
///
/// # Errors
///
/// Returns [`SourceError::Read`] when the input is not well-formed CSV.
pub fn parse_cases<R: Read>(reader: R, origin: &str) -> Result<Vec<Case>, SourceError> {
    let read_error = |source: csv::Error| SourceError::Read {
        origin: origin.to_string(),
        source,
    };
    let mut reader =
        ReaderBuilder::new().has_headers(true).trim(Trim::None).flexible(false).from_reader(reader);
    let headers = reader.headers().map_err(read_error)?.clone();
    let mut cases = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(read_error)?;
        let values: IndexMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();
        cases.push(Case::new(index + 1, values));
    }
    Ok(cases)
}

// ============================================================================
// SECTION: In-Memory Source
// ============================================================================

/// Case source that serves pre-built cases.
#[derive(Debug, Clone)]
pub struct InMemoryCaseSource {
    /// Label reported as the origin.
    origin: String,
    /// Cases returned on every load.
    cases: Vec<Case>,
}

impl InMemoryCaseSource {
    /// Creates an in-memory source.
    #[must_use]
    pub fn new(origin: impl Into<String>, cases: Vec<Case>) -> Self {
        Self {
            origin: origin.into(),
            cases,
        }
    }
}

impl CaseSource for InMemoryCaseSource {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn load(&self) -> Result<Vec<Case>, SourceError> {
        Ok(self.cases.clone())
    }
}
