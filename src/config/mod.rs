// ==========================================
// Planilha Import Engine - Configuration Layer
// ==========================================
// Immutable run configuration (environment-derived)
// and the external table schema contract.
// ==========================================

pub mod run_config;
pub mod table_schema;

// Re-export core configuration types
pub use run_config::{DatabaseConfig, LocaleConfig, RunConfig};
pub use table_schema::{
    is_valid_identifier, sanitize_identifier, ColumnSpec, SchemaCatalog, SourceMatch, TableSchema,
};
