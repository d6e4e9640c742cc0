// ==========================================
// Planilha Import Engine - Pipeline Traits
// ==========================================
// Interfaces between pipeline stages (no
// implementations here). The engine is wired from
// these seams; tests substitute doubles per stage.
// ==========================================

use crate::config::table_schema::TableSchema;
use crate::domain::record::{
    NaturalKey, NormalizedRecord, RawRow, RunOutcome, StoredRecord, UpsertOperation,
};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// FolderImporter Trait
// ==========================================
// Purpose: top-level engine interface (one run over
// the configured folder)
// Implementor: ImportEngine
#[async_trait]
pub trait FolderImporter {
    /// Run the whole import: scan the folder, stream every file through
    /// validate -> map -> load, and aggregate the run outcome. Never
    /// returns Err: every failure mode is absorbed into the outcome and
    /// its terminal status.
    async fn run(&mut self) -> RunOutcome;
}

// ==========================================
// RowValidator Trait
// ==========================================
// Purpose: raw row -> typed record, or a reject
// Implementor: RowValidatorImpl
pub trait RowValidator: Send + Sync {
    /// Validate one raw row against the table contract.
    ///
    /// # Returns
    /// - Ok(NormalizedRecord): every required column present and typed
    /// - Err(ValidationRejected): first violating column, human-readable
    fn validate(
        &self,
        row: &RawRow,
        headers: &[String],
        schema: &TableSchema,
    ) -> ImportResult<NormalizedRecord>;
}

// ==========================================
// ChangeMapper Trait
// ==========================================
// Purpose: decide insert/update/skip per record,
// honoring the last-wins duplicate policy
// Implementor: ChangeMapperImpl
pub trait ChangeMapper: Send + Sync {
    /// Map one file's records to operations, in original row order.
    /// `existing` is the batched store lookup for these records' keys;
    /// the mapper itself never queries the store.
    fn map_records(
        &mut self,
        schema: &TableSchema,
        records: Vec<NormalizedRecord>,
        existing: &HashMap<NaturalKey, StoredRecord>,
    ) -> Vec<UpsertOperation>;
}
