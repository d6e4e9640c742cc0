// ==========================================
// Planilha Import Engine - Import Engine
// ==========================================
// Orchestrates the run: scan folder -> per file:
// read -> validate -> map -> load in batches ->
// aggregate outcomes. Strictly sequential across
// files; file order is lexicographic so duplicate
// natural-key tie-breaks are reproducible.
// ==========================================

use crate::config::run_config::RunConfig;
use crate::config::table_schema::SchemaCatalog;
use crate::domain::record::{
    FileOutcome, NaturalKey, RejectDetail, RunOutcome, SourceFile, UpsertOperation,
};
use crate::importer::error::ImportError;
use crate::importer::file_reader::{self, SheetRows};
use crate::importer::import_engine_trait::{ChangeMapper, FolderImporter, RowValidator};
use crate::repository::loader::BatchLoader;
use crate::repository::target_repo::TargetTableRepository;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ImportEngine
// ==========================================
pub struct ImportEngine<R>
where
    R: TargetTableRepository,
{
    config: RunConfig,
    catalog: SchemaCatalog,

    // Pipeline stages
    validator: Box<dyn RowValidator>,
    mapper: Box<dyn ChangeMapper>,
    loader: BatchLoader<R>,
}

impl<R> ImportEngine<R>
where
    R: TargetTableRepository,
{
    pub fn new(
        config: RunConfig,
        catalog: SchemaCatalog,
        validator: Box<dyn RowValidator>,
        mapper: Box<dyn ChangeMapper>,
        loader: BatchLoader<R>,
    ) -> Self {
        Self {
            config,
            catalog,
            validator,
            mapper,
            loader,
        }
    }
}

#[async_trait::async_trait]
impl<R> FolderImporter for ImportEngine<R>
where
    R: TargetTableRepository,
{
    #[instrument(skip(self), fields(run_id))]
    async fn run(&mut self) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let mut outcome = RunOutcome::new(run_id.clone());

        info!(
            run_id = %run_id,
            folder = %self.config.folder.display(),
            "starting spreadsheet import run"
        );

        // === Setup: the store must be reachable before any file is read ===
        if let Err(e) = self.loader.ping().await {
            let fatal = ImportError::DatabaseUnreachable(e.to_string());
            error!(error = %fatal, "setup failed, aborting with zero files processed");
            outcome.fatal_error = Some(fatal.to_string());
            outcome.finalize();
            return outcome;
        }

        // === Setup: deterministic folder scan ===
        let files = match file_reader::scan_folder(&self.config.folder) {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "setup failed, aborting with zero files processed");
                outcome.fatal_error = Some(e.to_string());
                outcome.finalize();
                return outcome;
            }
        };

        if files.is_empty() {
            info!(folder = %self.config.folder.display(), "no spreadsheet files found");
            outcome.finalize();
            return outcome;
        }
        info!(count = files.len(), "files discovered");

        // === Per-file loop, strictly sequential ===
        for source in &files {
            let (file_outcome, halt) = self.import_file(source, &mut outcome.rejects).await;

            let stop_on_error = self.config.abort_on_first_error && !file_outcome.is_clean();
            outcome.files.push(file_outcome);

            if halt {
                warn!("unrecoverable store fault, remaining files not processed");
                break;
            }
            if stop_on_error {
                warn!("abort-on-first-error is set, remaining files not processed");
                break;
            }
        }

        outcome.finalize();
        outcome
    }
}

impl<R> ImportEngine<R>
where
    R: TargetTableRepository,
{
    /// Import one file. Returns its outcome plus a halt flag: true when a
    /// batch exhausted its retries (or a store lookup failed) and the run
    /// must not touch further files.
    async fn import_file(
        &mut self,
        source: &SourceFile,
        rejects: &mut Vec<RejectDetail>,
    ) -> (FileOutcome, bool) {
        let file_name = source.name();
        info!(file = %file_name, "processing file");

        let mut file_outcome = FileOutcome::new(file_name.clone());

        let sheets = match file_reader::read_source(source) {
            Ok(sheets) => sheets,
            Err(e) => {
                warn!(file = %file_name, error = %e, "skipping unreadable source");
                file_outcome.error = Some(e.to_string());
                return (file_outcome, false);
            }
        };

        for sheet in sheets {
            let halted = self
                .import_sheet(source, &sheet, &mut file_outcome, rejects)
                .await;
            if halted {
                return (file_outcome, true);
            }
        }

        info!(
            file = %file_name,
            read = file_outcome.read,
            validated = file_outcome.validated,
            rejected = file_outcome.rejected,
            inserted = file_outcome.inserted,
            updated = file_outcome.updated,
            skipped = file_outcome.skipped,
            failed = file_outcome.failed,
            "file processed"
        );
        (file_outcome, false)
    }

    /// Stream one sheet through validate -> map -> load. Returns true when
    /// the run must halt.
    async fn import_sheet(
        &mut self,
        source: &SourceFile,
        sheet: &SheetRows,
        file_outcome: &mut FileOutcome,
        rejects: &mut Vec<RejectDetail>,
    ) -> bool {
        let file_name = source.name();

        // Fail closed: a sheet outside the schema contract is a file-level
        // failure, not a silent pass-through
        let schema = match self.catalog.resolve(&source.stem, &sheet.sheet) {
            Some(schema) => schema,
            None => {
                let e = ImportError::SchemaNotCovered {
                    file: file_name.clone(),
                    sheet: sheet.sheet.clone(),
                };
                warn!(file = %file_name, sheet = %sheet.sheet, "{}", e);
                file_outcome.error = Some(e.to_string());
                return false;
            }
        };

        debug!(
            file = %file_name,
            sheet = %sheet.sheet,
            table = %schema.table,
            rows = sheet.rows.len(),
            "sheet mapped to target table"
        );
        file_outcome.read += sheet.rows.len();

        // === Validate ===
        let mut records = Vec::new();
        let mut reject_ops = Vec::new();
        for row in &sheet.rows {
            match self.validator.validate(row, &sheet.headers, schema) {
                Ok(record) => records.push(record),
                Err(ImportError::ValidationRejected { row, reason }) => {
                    warn!(file = %file_name, sheet = %sheet.sheet, row, %reason, "row rejected");
                    reject_ops.push(UpsertOperation::Reject {
                        row_number: row,
                        reason,
                    });
                }
                Err(other) => {
                    warn!(file = %file_name, row = row.row_number, error = %other, "row rejected");
                    reject_ops.push(UpsertOperation::Reject {
                        row_number: row.row_number,
                        reason: other.to_string(),
                    });
                }
            }
        }
        file_outcome.validated += records.len();

        // === Batched store lookup (never per-row) ===
        let mut keys: Vec<NaturalKey> = Vec::new();
        {
            let mut seen = std::collections::HashSet::new();
            for record in &records {
                if seen.insert(&record.key) {
                    keys.push(record.key.clone());
                }
            }
        }
        let existing = match self.loader.fetch_existing(schema, &keys).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(file = %file_name, error = %e, "store lookup failed");
                file_outcome.error = Some(e.to_string());
                return true;
            }
        };

        // === Map, then merge rejects back in row order ===
        let mut operations = self.mapper.map_records(schema, records, &existing);
        operations.extend(reject_ops);
        operations.sort_by_key(|op| op.row_number());

        // === Load in batches ===
        let report = self.loader.load(schema, &operations).await;
        file_outcome.inserted += report.inserted;
        file_outcome.updated += report.updated;
        file_outcome.skipped += report.skipped;
        file_outcome.rejected += report.rejects.len();
        file_outcome.failed += report.failed_rows.len();

        for (row_number, reason) in report.rejects {
            rejects.push(RejectDetail {
                file: file_name.clone(),
                sheet: sheet.sheet.clone(),
                row_number,
                reason,
            });
        }

        report.fatal.is_some()
    }
}
