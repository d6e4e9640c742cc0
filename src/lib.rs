// ==========================================
// Planilha Import Engine - Core Library
// ==========================================
// One-shot batch importer: spreadsheet folder
// (Excel/CSV) -> MySQL target tables. Invoked by CI;
// the process exit code is the machine-readable
// success signal.
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities and value types
pub mod domain;

// Repository layer - target store access
pub mod repository;

// Import layer - the pipeline
pub mod importer;

// Configuration layer - run config + schema contract
pub mod config;

// Database infrastructure (pool construction)
pub mod db;

// Logging
pub mod logging;

// Run reporting
pub mod reporter;

// ==========================================
// Re-export core types
// ==========================================

// Domain types
pub use domain::types::{CellValue, ColumnType, FieldValue, RunStatus, SkipReason};

// Domain entities
pub use domain::{
    FileKind, FileOutcome, NaturalKey, NormalizedRecord, RawRow, RejectDetail, RunOutcome,
    SourceFile, UpsertOperation,
};

// Configuration
pub use config::{RunConfig, SchemaCatalog, TableSchema};

// Pipeline
pub use importer::{FolderImporter, ImportEngine};

// Repository
pub use repository::{BatchLoader, MySqlTargetRepository, RetryPolicy, TargetTableRepository};

// ==========================================
// Constants
// ==========================================

// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Engine name (matches the binary the pipeline invokes)
pub const APP_NAME: &str = "import_planilhas_mysql";
