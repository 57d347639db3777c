// crates/case-harness/src/expectation.rs
// ============================================================================
// Module: Expectation Decoding
// Description: Flat, index-suffixed case columns decoded into nested trees.
// Purpose: Build expected shapes for the structural validator in one place.
// Dependencies: indexmap, serde_json, thiserror, crate::case
// ============================================================================

//! ## Overview
//! Case files encode nested expectations with index-suffixed column names.
//! Two forms are recognized for a group `G`:
//! - group-indexed: `G<i>_<field>`, nesting further as `G<i>_<S><j>_<field>`
//! - field-indexed: `G_<field><i>`
//!
//! A bare `G<i>` column contributes a scalar entry. All forms decode into
//! arrays with 0-based positions, so
//! `actions1_rules2_passed` lands at `[0].rules[1].passed`. Indices are
//! 1-based in column names; a zero index or a gap in the sequence is an
//! error. Empty cells are omitted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;

use crate::case::Case;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How a cell is converted into a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    /// Verbatim string.
    Text,
    /// Integer or floating-point number.
    Number,
    /// Case-insensitive `true`/`false`.
    Bool,
    /// Embedded JSON document.
    Json,
}

impl CellType {
    /// Returns a stable label for messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Json => "json",
        }
    }
}

/// Errors raised while decoding expectation columns.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ExpectationError {
    /// A column uses index zero.
    #[error("column '{column}' uses index 0; indices start at 1")]
    ZeroIndex {
        /// Offending column.
        column: String,
    },
    /// A group skips an index.
    #[error("expectations for '{group}' skip entry {missing}")]
    IndexGap {
        /// Path of the indexed group.
        group: String,
        /// First missing 1-based index.
        missing: usize,
    },
    /// A column in a group does not follow the naming convention.
    #[error("column '{column}' does not follow the indexed naming convention")]
    Malformed {
        /// Offending column.
        column: String,
    },
    /// Two columns decode to the same location or incompatible shapes.
    #[error("column '{column}' conflicts with another expectation column")]
    Conflict {
        /// Offending column.
        column: String,
    },
    /// A cell does not match its declared type.
    #[error("column '{column}' is not a valid {expected} cell: '{raw}'")]
    InvalidCell {
        /// Offending column.
        column: String,
        /// Declared cell type label.
        expected: &'static str,
        /// Raw cell value.
        raw: String,
    },
}

/// One step in a decoded path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Object key.
    Key(String),
    /// 1-based array position.
    Index(usize),
}

/// Intermediate tree used while collecting columns.
enum Node {
    /// Decoded cell.
    Leaf(Value),
    /// Object in column order.
    Object(IndexMap<String, Node>),
    /// Array keyed by 1-based index.
    List(BTreeMap<usize, Node>),
}

impl Node {
    /// Returns an empty container able to hold `segment`.
    fn container_for(segment: &Segment) -> Self {
        match segment {
            Segment::Key(_) => Self::Object(IndexMap::new()),
            Segment::Index(_) => Self::List(BTreeMap::new()),
        }
    }
}

// ============================================================================
// SECTION: Decoder
// ============================================================================

/// Decoder with per-field cell type overrides.
///
/// Fields without an override are inferred: a cell that parses as a JSON
/// literal becomes that value, anything else is kept as text.
#[derive(Debug, Clone, Default)]
pub struct ExpectationDecoder {
    /// Overrides keyed by field name (the final name segment of a column).
    overrides: BTreeMap<String, CellType>,
}

impl ExpectationDecoder {
    /// Creates a decoder that infers every cell type.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            overrides: BTreeMap::new(),
        }
    }

    /// Declares the cell type for a field name.
    #[must_use]
    pub fn with_type(mut self, field: impl Into<String>, cell_type: CellType) -> Self {
        self.overrides.insert(field.into(), cell_type);
        self
    }

    /// Returns the override for a field, if any.
    #[must_use]
    pub fn cell_type(&self, field: &str) -> Option<CellType> {
        self.overrides.get(field).copied()
    }

    /// Converts one raw cell for `field`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidCell`] when the cell does not match
    /// the field's declared type.
    pub fn decode_cell(
        &self,
        column: &str,
        field: &str,
        raw: &str,
    ) -> Result<Value, ExpectationError> {
        let Some(cell_type) = self.cell_type(field) else {
            return Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())));
        };
        let invalid = || ExpectationError::InvalidCell {
            column: column.to_string(),
            expected: cell_type.as_str(),
            raw: raw.to_string(),
        };
        match cell_type {
            CellType::Text => Ok(Value::String(raw.to_string())),
            CellType::Number => parse_number(raw).ok_or_else(invalid),
            CellType::Bool => {
                let trimmed = raw.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(invalid())
                }
            }
            CellType::Json => serde_json::from_str(raw).map_err(|_| invalid()),
        }
    }

    /// Builds an object from the listed scalar columns.
    ///
    /// Absent and empty columns are omitted; keys keep the listed order.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidCell`] for mistyped cells.
    pub fn decode_columns(&self, case: &Case, columns: &[&str]) -> Result<Value, ExpectationError> {
        let mut object = Map::new();
        for column in columns {
            if let Some(raw) = case.non_empty(column) {
                object.insert((*column).to_string(), self.decode_cell(column, column, raw)?);
            }
        }
        Ok(Value::Object(object))
    }

    /// Decodes every column of `group` into an array of objects.
    ///
    /// A case without any column for the group yields an empty array.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] for malformed names, zero indices, index
    /// gaps, conflicting columns, or mistyped cells.
    pub fn decode_group(&self, case: &Case, group: &str) -> Result<Value, ExpectationError> {
        let mut root = Node::List(BTreeMap::new());
        self.collect(case, group, &mut root, false)?;
        finalize(root, group)
    }

    /// Decodes `group` into an object keyed by the column index.
    ///
    /// Used where the response keys entries by identifier rather than
    /// position (`parcelItem1_code` becomes `{"1": {"code": ...}}`). Indices
    /// need not be contiguous.
    ///
    /// # Errors
    ///
    /// Same as [`ExpectationDecoder::decode_group`], except for gaps.
    pub fn decode_keyed_group(&self, case: &Case, group: &str) -> Result<Value, ExpectationError> {
        let mut root = Node::Object(IndexMap::new());
        self.collect(case, group, &mut root, true)?;
        finalize(root, group)
    }

    /// Inserts every non-empty column of `group` into `root`.
    fn collect(
        &self,
        case: &Case,
        group: &str,
        root: &mut Node,
        keyed: bool,
    ) -> Result<(), ExpectationError> {
        for (column, raw) in case.iter() {
            if raw.is_empty() {
                continue;
            }
            let Some(mut path) = group_path(column, group)? else {
                continue;
            };
            if keyed && let Some(Segment::Index(index)) = path.first() {
                let key = index.to_string();
                path[0] = Segment::Key(key);
            }
            let field = match path.last() {
                Some(Segment::Key(field)) if path.len() > 1 => field.clone(),
                _ => group.to_string(),
            };
            let leaf = self.decode_cell(column, &field, raw)?;
            insert(root, &path, leaf, column)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Column Names
// ============================================================================

/// Parses a column into a path under `group`; `None` when the column is not
/// part of the group.
fn group_path(column: &str, group: &str) -> Result<Option<Vec<Segment>>, ExpectationError> {
    let Some(rest) = column.strip_prefix(group) else {
        return Ok(None);
    };
    let malformed = || ExpectationError::Malformed {
        column: column.to_string(),
    };
    if let Some(field) = rest.strip_prefix('_') {
        let (name, index) = split_index(field).ok_or_else(malformed)?;
        let index = nonzero(index, column)?;
        return Ok(Some(vec![Segment::Index(index), Segment::Key(name.to_string())]));
    }
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return Ok(None);
    }
    let index = rest[..digits].parse::<usize>().map_err(|_| malformed())?;
    let mut path = vec![Segment::Index(nonzero(index, column)?)];
    if digits == rest.len() {
        return Ok(Some(path));
    }
    let remainder = rest[digits..].strip_prefix('_').filter(|tail| !tail.is_empty());
    let remainder = remainder.ok_or_else(malformed)?;
    let parts: Vec<&str> = remainder.split('_').collect();
    let Some((last, nested)) = parts.split_last() else {
        return Err(malformed());
    };
    for part in nested {
        let (name, index) = split_index(part).ok_or_else(malformed)?;
        path.push(Segment::Key(name.to_string()));
        path.push(Segment::Index(nonzero(index, column)?));
    }
    if last.is_empty() {
        return Err(malformed());
    }
    path.push(Segment::Key((*last).to_string()));
    Ok(Some(path))
}

/// Splits `name<digits>` into its name and index.
fn split_index(segment: &str) -> Option<(&str, usize)> {
    let name = segment.trim_end_matches(|c: char| c.is_ascii_digit());
    if name.is_empty() || name.len() == segment.len() {
        return None;
    }
    segment[name.len()..].parse().ok().map(|index| (name, index))
}

/// Rejects index zero.
fn nonzero(index: usize, column: &str) -> Result<usize, ExpectationError> {
    if index == 0 {
        return Err(ExpectationError::ZeroIndex {
            column: column.to_string(),
        });
    }
    Ok(index)
}

/// Parses an integer or finite float cell.
fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Value::from(integer));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

// ============================================================================
// SECTION: Tree Assembly
// ============================================================================

/// Inserts `leaf` at `path` below `node`.
fn insert(node: &mut Node, path: &[Segment], leaf: Value, column: &str) -> Result<(), ExpectationError> {
    let conflict = || ExpectationError::Conflict {
        column: column.to_string(),
    };
    let Some((head, tail)) = path.split_first() else {
        return Err(conflict());
    };
    let child = match (node, head) {
        (Node::Object(map), Segment::Key(key)) => {
            if tail.is_empty() {
                if map.contains_key(key) {
                    return Err(conflict());
                }
                map.insert(key.clone(), Node::Leaf(leaf));
                return Ok(());
            }
            map.entry(key.clone()).or_insert_with(|| Node::container_for(&tail[0]))
        }
        (Node::List(items), Segment::Index(index)) => {
            if tail.is_empty() {
                if items.contains_key(index) {
                    return Err(conflict());
                }
                items.insert(*index, Node::Leaf(leaf));
                return Ok(());
            }
            items.entry(*index).or_insert_with(|| Node::container_for(&tail[0]))
        }
        _ => return Err(conflict()),
    };
    insert(child, tail, leaf, column)
}

/// Converts the collected tree into JSON, checking index contiguity.
fn finalize(node: Node, label: &str) -> Result<Value, ExpectationError> {
    match node {
        Node::Leaf(value) => Ok(value),
        Node::Object(map) => {
            let mut object = Map::new();
            for (key, child) in map {
                let child_label = format!("{label}.{key}");
                object.insert(key, finalize(child, &child_label)?);
            }
            Ok(Value::Object(object))
        }
        Node::List(items) => {
            let mut array = Vec::with_capacity(items.len());
            for (expected, (index, child)) in (1..).zip(items) {
                if index != expected {
                    return Err(ExpectationError::IndexGap {
                        group: label.to_string(),
                        missing: expected,
                    });
                }
                array.push(finalize(child, &format!("{label}[{}]", index - 1))?);
            }
            Ok(Value::Array(array))
        }
    }
}
