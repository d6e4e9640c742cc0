// ==========================================
// Planilha Import Engine - Repository Errors
// ==========================================
// Splits store faults into transient (retry the
// batch) and structural (isolate the row). The
// split drives the loader's retry loop.
// ==========================================

use thiserror::Error;

/// Repository layer error type
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== Connection establishment =====
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    // ===== Transient faults (retry the whole batch) =====
    #[error("transient store fault: {0}")]
    Transient(String),

    // ===== Structural faults (isolate the offending row) =====
    #[error("structural store fault (row {row}): {message}")]
    Structural { row: usize, message: String },

    // ===== Everything else =====
    #[error("database query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// Attach the originating row number (structural faults are detected
    /// at the statement level, where the row is known to the caller).
    pub fn with_row(self, row: usize) -> Self {
        match self {
            RepositoryError::Structural { message, .. } => {
                RepositoryError::Structural { row, message }
            }
            other => other,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Transient(_))
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, RepositoryError::Structural { .. })
    }
}

// MySQL error classification.
//
// Transient: lock wait timeout (1205), deadlock (1213), server-gone /
// lost-connection (2006, 2013), plus driver-level I/O and pool faults.
// Structural: duplicate key (1062), FK violation (1452), bad null (1048),
// out-of-range / truncation (1264, 1265, 1406), incorrect value (1366).
impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => RepositoryError::Transient(err.to_string()),
            _ => match err.as_database_error() {
                Some(db_err) => {
                    let message = db_err.to_string();
                    // SQLSTATE is too coarse; the native number decides
                    let number = db_err
                        .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                        .map(|e| e.number());
                    match number {
                        Some(1205) | Some(1213) | Some(2006) | Some(2013) => {
                            RepositoryError::Transient(message)
                        }
                        Some(1048) | Some(1062) | Some(1264) | Some(1265) | Some(1366)
                        | Some(1406) | Some(1452) => RepositoryError::Structural {
                            row: 0, // caller attaches the row via with_row
                            message,
                        },
                        _ => RepositoryError::Query(message),
                    }
                }
                None => RepositoryError::Query(err.to_string()),
            },
        }
    }
}

/// Result type alias
pub type RepositoryResult<T> = Result<T, RepositoryError>;
