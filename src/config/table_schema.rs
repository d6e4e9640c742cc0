// ==========================================
// Planilha Import Engine - Schema Contract
// ==========================================
// The target tables (columns, types, natural keys)
// are an externally supplied contract loaded from a
// companion JSON file. The engine conforms to it and
// never infers or creates table structure.
// ==========================================

use crate::domain::types::ColumnType;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ==========================================
// ColumnSpec - one target column
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
}

// ==========================================
// SourceMatch - which sheets feed a table
// ==========================================
// file_stem matches the source file name without
// extension (case-insensitive); sheet narrows to one
// sheet, or matches every sheet when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMatch {
    pub file_stem: String,
    #[serde(default)]
    pub sheet: Option<String>,
}

// ==========================================
// TableSchema - contract for one target table
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub source: SourceMatch,
    pub columns: Vec<ColumnSpec>,
    pub natural_key: Vec<String>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Non-key columns, the ones an Update may touch.
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| !self.natural_key.contains(&c.name))
    }
}

// ==========================================
// SchemaCatalog - all table contracts
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    /// Load and validate the schema contract file. Any structural problem
    /// here is a setup failure: the run must abort before any file is read.
    pub fn load(path: &Path) -> ImportResult<SchemaCatalog> {
        let raw = std::fs::read_to_string(path).map_err(|e| ImportError::SchemaFileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let catalog: SchemaCatalog =
            serde_json::from_str(&raw).map_err(|e| ImportError::SchemaFileError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        catalog.validate()?;
        Ok(catalog)
    }

    /// Resolve the contract for one sheet of one file; None when the
    /// sheet is not covered by the contract (the caller fails closed).
    pub fn resolve(&self, file_stem: &str, sheet: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| {
            t.source.file_stem.eq_ignore_ascii_case(file_stem)
                && t.source
                    .sheet
                    .as_deref()
                    .map(|s| s.eq_ignore_ascii_case(sheet))
                    .unwrap_or(true)
        })
    }

    fn validate(&self) -> ImportResult<()> {
        if self.tables.is_empty() {
            return Err(ImportError::SchemaInvalid {
                table: "-".to_string(),
                message: "schema contract lists no tables".to_string(),
            });
        }

        for table in &self.tables {
            if !is_valid_identifier(&table.table) {
                return Err(ImportError::SchemaInvalid {
                    table: table.table.clone(),
                    message: "table name is not a valid MySQL identifier".to_string(),
                });
            }

            if table.columns.is_empty() {
                return Err(ImportError::SchemaInvalid {
                    table: table.table.clone(),
                    message: "table lists no columns".to_string(),
                });
            }

            let mut seen = HashSet::new();
            for column in &table.columns {
                if !is_valid_identifier(&column.name) {
                    return Err(ImportError::SchemaInvalid {
                        table: table.table.clone(),
                        message: format!("column name {:?} is not a valid identifier", column.name),
                    });
                }
                if !seen.insert(column.name.as_str()) {
                    return Err(ImportError::SchemaInvalid {
                        table: table.table.clone(),
                        message: format!("duplicate column {:?}", column.name),
                    });
                }
            }

            if table.natural_key.is_empty() {
                return Err(ImportError::SchemaInvalid {
                    table: table.table.clone(),
                    message: "natural key is empty".to_string(),
                });
            }
            for key_column in &table.natural_key {
                if table.column(key_column).is_none() {
                    return Err(ImportError::SchemaInvalid {
                        table: table.table.clone(),
                        message: format!("natural key column {:?} is not declared", key_column),
                    });
                }
            }
        }

        Ok(())
    }
}

/// MySQL identifier hygiene for names spliced into SQL: lowercase
/// `[a-z0-9_]`, no leading digit, at most 64 chars.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Derive a valid identifier from a free-form name (file stems and sheet
/// names used in log context): lowercase, invalid chars to `_`, `t_`
/// prefix for a leading digit, truncated to 64.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "t_");
    }
    out.truncate(64);
    out
}
