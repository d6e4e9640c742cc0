// ==========================================
// Planilha Import Engine - Domain Types
// ==========================================
// Cell/field value variants and run-level enums.
// CellValue is produced by the reader and consumed
// only by the validator; FieldValue is the typed
// form that reaches the mapper and loader.
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CellValue - untyped spreadsheet cell
// ==========================================
// Tagged variant for raw cells; no implicit coercion
// happens outside the validator boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Whether the cell carries no value (empty or blank text).
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Short type label used in reject reasons ("expected decimal, got text").
    pub fn type_label(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Text(_) => "text",
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "number",
            CellValue::Bool(_) => "boolean",
            CellValue::DateTime(_) => "datetime",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

// ==========================================
// ColumnType - per-column coercion target
// ==========================================
// Declared by the external schema contract; the
// validator owns the coercion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Date,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Decimal => write!(f, "decimal"),
            ColumnType::Date => write!(f, "date"),
        }
    }
}

// ==========================================
// FieldValue - typed, normalized field
// ==========================================
// Only the validator constructs these; everything
// downstream treats them as opaque typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Canonical string form, used to build natural-key composites.
    pub fn canonical(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Decimal(v) => format!("{}", v),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.canonical()),
        }
    }
}

// ==========================================
// SkipReason - why a row produced no write
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// A later row in file-then-row order carries the same natural key.
    SupersededByLaterRow,
    /// The stored row already matches every mapped field.
    IdenticalToStored,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SupersededByLaterRow => write!(f, "superseded-by-later-row"),
            SkipReason::IdenticalToStored => write!(f, "identical-to-stored"),
        }
    }
}

// ==========================================
// RunStatus - terminal status of one run
// ==========================================
// Serialization: SCREAMING_SNAKE_CASE (stable summary contract)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    PartialFailure,
    Fatal,
}

impl RunStatus {
    /// Process exit code consumed by the CI caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 1,
            RunStatus::Fatal => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::PartialFailure => write!(f, "PARTIAL_FAILURE"),
            RunStatus::Fatal => write!(f, "FATAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_is_blank() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Text("x".to_string()).is_blank());
        assert!(!CellValue::Integer(0).is_blank());
    }

    #[test]
    fn test_field_value_canonical() {
        assert_eq!(FieldValue::Text("Ana".to_string()).canonical(), "Ana");
        assert_eq!(FieldValue::Integer(42).canonical(), "42");
        assert_eq!(
            FieldValue::Date(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()).canonical(),
            "2025-01-20"
        );
        assert_eq!(FieldValue::Null.canonical(), "");
    }

    #[test]
    fn test_run_status_exit_code() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::PartialFailure.exit_code(), 1);
        assert_eq!(RunStatus::Fatal.exit_code(), 2);
    }
}
