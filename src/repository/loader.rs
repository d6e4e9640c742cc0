// ==========================================
// Planilha Import Engine - Database Loader
// ==========================================
// Applies mapped operations in bounded batches, one
// transaction per batch. Owns the retry policy for
// transient faults; on exhaustion the batch's rows
// (and everything after them in the file) are
// abandoned and the engine halts further files.
// ==========================================

use crate::config::table_schema::TableSchema;
use crate::domain::record::{NaturalKey, StoredRecord, UpsertOperation};
use crate::repository::error::RepositoryResult;
use crate::repository::retry::RetryPolicy;
use crate::repository::target_repo::{BatchReport, TargetTableRepository};
use std::collections::HashMap;
use tracing::{debug, warn};

// ==========================================
// LoadReport - result of loading one file
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Row-level rejects (validation carried through + structural store
    /// faults), with reasons.
    pub rejects: Vec<(usize, String)>,
    /// Rows abandoned after a batch exhausted its retries.
    pub failed_rows: Vec<usize>,
    /// Set when a batch gave up; the run must not continue to other files.
    pub fatal: Option<String>,
}

// ==========================================
// BatchLoader
// ==========================================
pub struct BatchLoader<R: TargetTableRepository> {
    repo: R,
    policy: RetryPolicy,
    batch_size: usize,
}

impl<R: TargetTableRepository> BatchLoader<R> {
    pub fn new(repo: R, policy: RetryPolicy, batch_size: usize) -> Self {
        Self {
            repo,
            policy,
            batch_size,
        }
    }

    /// Startup connectivity probe (delegated; failure is a setup fault).
    pub async fn ping(&self) -> RepositoryResult<()> {
        self.repo.ping().await
    }

    /// Batched natural-key lookup (delegated).
    pub async fn fetch_existing(
        &self,
        schema: &TableSchema,
        keys: &[NaturalKey],
    ) -> RepositoryResult<HashMap<NaturalKey, StoredRecord>> {
        self.repo.fetch_existing(schema, keys).await
    }

    /// Apply one file's operations in batches of `batch_size`.
    ///
    /// Each batch is one transaction. A transient fault retries the whole
    /// batch per the policy; exhaustion marks the batch's rows failed,
    /// abandons the file's remaining batches and flags the report fatal.
    pub async fn load(
        &self,
        schema: &TableSchema,
        operations: &[UpsertOperation],
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let batches: Vec<&[UpsertOperation]> = operations.chunks(self.batch_size).collect();

        for (index, batch) in batches.iter().enumerate() {
            match self.apply_with_retry(schema, batch).await {
                Ok(batch_report) => {
                    debug!(
                        table = %schema.table,
                        batch = index + 1,
                        inserted = batch_report.inserted,
                        updated = batch_report.updated,
                        skipped = batch_report.skipped,
                        rejects = batch_report.row_rejects.len(),
                        "batch committed"
                    );
                    report.inserted += batch_report.inserted;
                    report.updated += batch_report.updated;
                    report.skipped += batch_report.skipped;
                    report.rejects.extend(batch_report.row_rejects);
                }
                Err(message) => {
                    warn!(
                        table = %schema.table,
                        batch = index + 1,
                        error = %message,
                        "batch abandoned after retries"
                    );
                    for abandoned in &batches[index..] {
                        report
                            .failed_rows
                            .extend(abandoned.iter().map(|op| op.row_number()));
                    }
                    report.fatal = Some(message);
                    break;
                }
            }
        }

        report
    }

    async fn apply_with_retry(
        &self,
        schema: &TableSchema,
        batch: &[UpsertOperation],
    ) -> Result<BatchReport, String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.repo.apply_batch(schema, batch).await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_transient() && attempt < self.policy.total_attempts() => {
                    let delay = self.policy.delay_before_retry(attempt);
                    warn!(
                        table = %schema.table,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient store fault, retrying batch"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::table_schema::{ColumnSpec, SourceMatch};
    use crate::domain::record::NormalizedRecord;
    use crate::domain::types::{ColumnType, FieldValue};
    use crate::repository::error::RepositoryError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_schema() -> TableSchema {
        TableSchema {
            table: "clients".to_string(),
            source: SourceMatch {
                file_stem: "clients".to_string(),
                sheet: None,
            },
            columns: vec![ColumnSpec {
                name: "id".to_string(),
                column_type: ColumnType::Integer,
                required: true,
            }],
            natural_key: vec!["id".to_string()],
        }
    }

    fn insert_op(row_number: usize, id: i64) -> UpsertOperation {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), FieldValue::Integer(id));
        UpsertOperation::Insert {
            record: NormalizedRecord {
                values,
                key: NaturalKey(vec![id.to_string()]),
                row_number,
            },
        }
    }

    /// Repository double that fails the first N apply_batch calls with a
    /// transient fault, then succeeds.
    struct FlakyRepository {
        transient_failures: Mutex<u32>,
        attempts: AtomicU32,
    }

    impl FlakyRepository {
        fn failing(times: u32) -> Self {
            Self {
                transient_failures: Mutex::new(times),
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TargetTableRepository for FlakyRepository {
        async fn ping(&self) -> RepositoryResult<()> {
            Ok(())
        }

        async fn fetch_existing(
            &self,
            _schema: &TableSchema,
            _keys: &[NaturalKey],
        ) -> RepositoryResult<HashMap<NaturalKey, StoredRecord>> {
            Ok(HashMap::new())
        }

        async fn apply_batch(
            &self,
            _schema: &TableSchema,
            operations: &[UpsertOperation],
        ) -> RepositoryResult<BatchReport> {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let mut remaining = self.transient_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RepositoryError::Transient(
                    "lost connection during query".to_string(),
                ));
            }

            let mut report = BatchReport::default();
            for op in operations {
                match op {
                    UpsertOperation::Insert { .. } => report.inserted += 1,
                    UpsertOperation::Update { .. } => report.updated += 1,
                    UpsertOperation::Skip { .. } => report.skipped += 1,
                    UpsertOperation::Reject { row_number, reason } => {
                        report.row_rejects.push((*row_number, reason.clone()))
                    }
                }
            }
            Ok(report)
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_load_recovers_after_transient_faults() {
        let repo = FlakyRepository::failing(2);
        let loader = BatchLoader::new(repo, fast_policy(3), 100);

        let ops = vec![insert_op(2, 1), insert_op(3, 2)];
        let report = loader.load(&test_schema(), &ops).await;

        // Counts as if no fault occurred
        assert!(report.fatal.is_none());
        assert_eq!(report.inserted, 2);
        assert!(report.failed_rows.is_empty());
        assert_eq!(loader.repo.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_gives_up_after_exhausting_retries() {
        let repo = FlakyRepository::failing(10);
        let loader = BatchLoader::new(repo, fast_policy(3), 100);

        let ops = vec![insert_op(2, 1), insert_op(3, 2)];
        let report = loader.load(&test_schema(), &ops).await;

        // Exactly max_retries + 1 attempts, then the batch's rows fail
        assert_eq!(loader.repo.attempts.load(Ordering::SeqCst), 4);
        assert!(report.fatal.is_some());
        assert_eq!(report.failed_rows, vec![2, 3]);
        assert_eq!(report.inserted, 0);
    }

    #[tokio::test]
    async fn test_load_abandons_remaining_batches_after_fatal() {
        // batch_size 1: second batch exhausts retries, third is never tried
        let repo = FlakyRepository::failing(0);
        let loader = BatchLoader::new(repo, fast_policy(0), 1);

        // First batch succeeds, then make every later call fail
        let ops = vec![insert_op(2, 1), insert_op(3, 2), insert_op(4, 3)];
        {
            let report = loader.load(&test_schema(), &ops[..1]).await;
            assert_eq!(report.inserted, 1);
        }
        *loader.repo.transient_failures.lock().unwrap() = 10;
        let report = loader.load(&test_schema(), &ops[1..]).await;

        assert!(report.fatal.is_some());
        assert_eq!(report.failed_rows, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_load_splits_operations_into_batches() {
        let repo = FlakyRepository::failing(0);
        let loader = BatchLoader::new(repo, fast_policy(0), 2);

        let ops = vec![insert_op(2, 1), insert_op(3, 2), insert_op(4, 3)];
        let report = loader.load(&test_schema(), &ops).await;

        assert_eq!(report.inserted, 3);
        // 3 ops at batch_size 2 -> 2 transactions
        assert_eq!(loader.repo.attempts.load(Ordering::SeqCst), 2);
    }
}
