// ==========================================
// Planilha Import Engine - Import Error Types
// ==========================================
// Taxonomy: file-level faults skip the file, row-level
// faults skip the row, transient store faults are
// retried, structural store faults are isolated to the
// row, setup faults abort the run before any file.
// ==========================================

use thiserror::Error;

/// Import pipeline error type
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== File-level faults (non-fatal, skip the file) =====
    #[error("unreadable source {file}: {message}")]
    SourceUnreadable { file: String, message: String },

    #[error("no schema contract entry for {file} sheet {sheet}")]
    SchemaNotCovered { file: String, sheet: String },

    // ===== Row-level faults (non-fatal, skip the row) =====
    #[error("row {row}: {reason}")]
    ValidationRejected { row: usize, reason: String },

    // ===== Store faults =====
    #[error("transient store fault: {0}")]
    TransientStoreFault(String),

    #[error("structural store fault (row {row}): {message}")]
    StructuralStoreFault { row: usize, message: String },

    // ===== Setup faults (abort before any file is processed) =====
    #[error("configuration missing (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("configuration invalid (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    #[error("schema contract file {path}: {message}")]
    SchemaFileError { path: String, message: String },

    #[error("schema contract (table {table}): {message}")]
    SchemaInvalid { table: String, message: String },

    #[error("folder {0} is missing or not readable")]
    FolderUnreadable(String),

    #[error("database unreachable: {0}")]
    DatabaseUnreachable(String),

    // ===== Generic =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// Setup faults abort the run with a zero-files summary; everything
    /// else is absorbed into per-file/per-row outcomes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::ConfigReadError { .. }
                | ImportError::ConfigValueError { .. }
                | ImportError::SchemaFileError { .. }
                | ImportError::SchemaInvalid { .. }
                | ImportError::FolderUnreadable(_)
                | ImportError::DatabaseUnreachable(_)
        )
    }
}

// Store faults surface through the repository layer; keep the
// transient/structural split when they cross into the pipeline.
impl From<crate::repository::error::RepositoryError> for ImportError {
    fn from(err: crate::repository::error::RepositoryError) -> Self {
        use crate::repository::error::RepositoryError;
        match err {
            RepositoryError::Transient(message) => ImportError::TransientStoreFault(message),
            RepositoryError::Structural { row, message } => {
                ImportError::StructuralStoreFault { row, message }
            }
            RepositoryError::ConnectionFailed(message) => {
                ImportError::DatabaseUnreachable(message)
            }
            other => ImportError::Other(anyhow::anyhow!(other)),
        }
    }
}

/// Result type alias
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fatal_classification() {
        assert!(ImportError::DatabaseUnreachable("refused".to_string()).is_fatal());
        assert!(ImportError::FolderUnreadable("./planilhas".to_string()).is_fatal());
        assert!(ImportError::SchemaFileError {
            path: "x.json".to_string(),
            message: "missing".to_string()
        }
        .is_fatal());

        assert!(!ImportError::SourceUnreadable {
            file: "a.xlsx".to_string(),
            message: "corrupt".to_string()
        }
        .is_fatal());
        assert!(!ImportError::ValidationRejected {
            row: 3,
            reason: "column \"id\": required but empty".to_string()
        }
        .is_fatal());
        assert!(!ImportError::TransientStoreFault("lock wait timeout".to_string()).is_fatal());
    }
}
