// ==========================================
// Planilha Import Engine - Pipeline Entities
// ==========================================
// Entities handed off stage to stage, by move:
// reader -> RawRow, validator -> NormalizedRecord,
// mapper -> UpsertOperation, loader/engine -> outcomes.
// ==========================================

use crate::domain::types::{CellValue, FieldValue, RunStatus, SkipReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ==========================================
// FileKind - supported spreadsheet formats
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Xlsx,
    Xls,
    Csv,
}

impl FileKind {
    /// Map a file extension (case-insensitive) to a supported kind.
    pub fn from_extension(ext: &str) -> Option<FileKind> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            "csv" => Some(FileKind::Csv),
            _ => None,
        }
    }
}

// ==========================================
// SourceFile - one spreadsheet in the folder
// ==========================================
// Created at folder scan time; read-only afterward.
// Sheet names are discovered when the workbook is
// opened, since discovery requires parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name without extension; keyed against the schema contract.
    pub stem: String,
    pub kind: FileKind,
    pub modified_at: Option<DateTime<Utc>>,
}

impl SourceFile {
    /// Display name used in log lines and reject details.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ==========================================
// RawRow - one untyped spreadsheet row
// ==========================================
// Produced by the reader, consumed once by the
// validator. row_number is 1-based and counts the
// header row, matching what a user sees in Excel.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: Vec<CellValue>,
}

impl RawRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.is_blank())
    }
}

// ==========================================
// NaturalKey - identity of a logical record
// ==========================================
// Canonical string composite over the configured key
// columns; used for in-run dedup and store matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey(pub Vec<String>);

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

// ==========================================
// NormalizedRecord - typed, validated row
// ==========================================
// Invariant: every required column is present and
// type-conformant; otherwise the validator rejects
// instead of constructing the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Target column -> typed value, covering every schema column.
    pub values: BTreeMap<String, FieldValue>,
    pub key: NaturalKey,
    pub row_number: usize,
}

// ==========================================
// UpsertOperation - one unit of loader work
// ==========================================
// Produced by the change mapper (Reject also by the
// validator, routed through the engine); consumed
// exactly once by the database loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpsertOperation {
    Insert {
        record: NormalizedRecord,
    },
    Update {
        key: NaturalKey,
        row_number: usize,
        /// Only the fields that differ from the stored row.
        changed: BTreeMap<String, FieldValue>,
    },
    Skip {
        key: NaturalKey,
        row_number: usize,
        reason: SkipReason,
    },
    /// Row that must not be written; counted, never executed.
    Reject {
        row_number: usize,
        reason: String,
    },
}

impl UpsertOperation {
    pub fn row_number(&self) -> usize {
        match self {
            UpsertOperation::Insert { record } => record.row_number,
            UpsertOperation::Update { row_number, .. } => *row_number,
            UpsertOperation::Skip { row_number, .. } => *row_number,
            UpsertOperation::Reject { row_number, .. } => *row_number,
        }
    }
}

// ==========================================
// StoredRecord - current state of a target row
// ==========================================
// Fetched in one batched query per file; the mapper
// compares against it to decide update vs skip.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub values: BTreeMap<String, FieldValue>,
}

// ==========================================
// RejectDetail - one user-visible reject
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectDetail {
    pub file: String,
    pub sheet: String,
    pub row_number: usize,
    pub reason: String,
}

// ==========================================
// FileOutcome - per-file counters
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file: String,
    pub read: usize,
    pub validated: usize,
    pub rejected: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Rows abandoned after a transient-fault batch exhausted its retries.
    pub failed: usize,
    /// File-level failure (unreadable source, missing schema entry).
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn new(file: impl Into<String>) -> Self {
        FileOutcome {
            file: file.into(),
            ..FileOutcome::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.failed == 0 && self.error.is_none()
    }
}

// ==========================================
// RunOutcome - aggregate of one engine run
// ==========================================
// Owned by the run reporter; finalized only after all
// files are processed or a fatal error aborts the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub files: Vec<FileOutcome>,
    pub rejects: Vec<RejectDetail>,
    /// Set only when the run aborted before any file was processed.
    pub fatal_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunOutcome {
    pub fn new(run_id: impl Into<String>) -> Self {
        RunOutcome {
            run_id: run_id.into(),
            status: RunStatus::Success,
            files: Vec::new(),
            rejects: Vec::new(),
            fatal_error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Totals across files: (read, validated, rejected, inserted, updated, skipped, failed).
    pub fn totals(&self) -> (usize, usize, usize, usize, usize, usize, usize) {
        self.files.iter().fold((0, 0, 0, 0, 0, 0, 0), |acc, f| {
            (
                acc.0 + f.read,
                acc.1 + f.validated,
                acc.2 + f.rejected,
                acc.3 + f.inserted,
                acc.4 + f.updated,
                acc.5 + f.skipped,
                acc.6 + f.failed,
            )
        })
    }

    /// Final status per the reporting contract: Fatal only for pre-run
    /// setup failures; any reject, failed row or unreadable file demotes
    /// the run to PartialFailure.
    pub fn finalize(&mut self) {
        self.finished_at = Some(Utc::now());
        if self.fatal_error.is_some() {
            self.status = RunStatus::Fatal;
        } else if self.files.iter().all(|f| f.is_clean()) {
            self.status = RunStatus::Success;
        } else {
            self.status = RunStatus::PartialFailure;
        }
    }
}
