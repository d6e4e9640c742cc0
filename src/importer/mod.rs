// ==========================================
// Planilha Import Engine - Import Layer
// ==========================================
// The pipeline itself: folder/file reading, row
// validation, change mapping, run orchestration.
// Supports: Excel (.xlsx/.xls), CSV
// ==========================================

// Module declarations
pub mod change_mapper;
pub mod error;
pub mod file_reader;
pub mod import_engine;
pub mod import_engine_trait;
pub mod row_validator;

// Re-export core types
pub use change_mapper::ChangeMapper as ChangeMapperImpl;
pub use error::{ImportError, ImportResult};
pub use file_reader::{read_source, scan_folder, SheetRows};
pub use import_engine::ImportEngine;
pub use row_validator::RowValidator as RowValidatorImpl;

// Re-export trait interfaces
pub use import_engine_trait::{ChangeMapper, FolderImporter, RowValidator};
