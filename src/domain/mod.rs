// ==========================================
// Planilha Import Engine - Domain Layer
// ==========================================
// Entities and value types moved through the import
// pipeline. No data access, no parsing logic here.
// ==========================================

pub mod record;
pub mod types;

// Re-export core types
pub use record::{
    FileKind, FileOutcome, NaturalKey, NormalizedRecord, RawRow, RejectDetail, RunOutcome,
    SourceFile, StoredRecord, UpsertOperation,
};
pub use types::{CellValue, ColumnType, FieldValue, RunStatus, SkipReason};
