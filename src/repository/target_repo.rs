// ==========================================
// Planilha Import Engine - Target Repository Trait
// ==========================================
// Interface to the relational target store. The
// engine and loader depend on this trait only; the
// MySQL implementation and the in-memory test double
// both live behind it.
// ==========================================

use crate::config::table_schema::TableSchema;
use crate::domain::record::{NaturalKey, StoredRecord, UpsertOperation};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// BatchReport - result of one committed batch
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Structurally rejected rows: (row number, reason). The rest of the
    /// batch committed without them.
    pub row_rejects: Vec<(usize, String)>,
}

// ==========================================
// TargetTableRepository Trait
// ==========================================
// Implementors: MySqlTargetRepository (production),
// MockRepository (tests)
#[async_trait]
pub trait TargetTableRepository: Send + Sync {
    /// Cheap connectivity probe, run once at startup. Failure here is a
    /// fatal setup error: the run aborts before any file is read.
    async fn ping(&self) -> RepositoryResult<()>;

    /// Batched natural-key lookup: current store state for exactly the
    /// given keys. Called once per file, never per row.
    async fn fetch_existing(
        &self,
        schema: &TableSchema,
        keys: &[NaturalKey],
    ) -> RepositoryResult<HashMap<NaturalKey, StoredRecord>>;

    /// Apply one batch inside one transaction.
    ///
    /// Insert/Update execute SQL; Skip/Reject operations are only counted.
    /// A structural fault marks the offending row in `row_rejects` and the
    /// transaction commits the remainder. A transient fault rolls the
    /// whole batch back and surfaces as Err(Transient) for the loader's
    /// retry loop. Either way no transaction stays open on return.
    async fn apply_batch(
        &self,
        schema: &TableSchema,
        operations: &[UpsertOperation],
    ) -> RepositoryResult<BatchReport>;
}
