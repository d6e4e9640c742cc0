// ==========================================
// Planilha Import Engine - MySQL Repository
// ==========================================
// sqlx-backed implementation of the target store.
// One transaction per batch; structural faults are
// isolated per statement so the remainder commits;
// transient faults roll the whole batch back for
// the loader's retry loop.
// ==========================================
// Identifier safety: table/column names come from the
// validated schema contract (see table_schema) and are
// quoted with backticks here; values are always bound.
// ==========================================

use crate::config::table_schema::{ColumnSpec, TableSchema};
use crate::domain::record::{NaturalKey, StoredRecord, UpsertOperation};
use crate::domain::types::{ColumnType, FieldValue};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::target_repo::{BatchReport, TargetTableRepository};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Row};
use std::collections::{BTreeMap, HashMap};

/// Keys per SELECT ... IN (...) lookup query.
const FETCH_CHUNK_SIZE: usize = 500;

// ==========================================
// MySqlTargetRepository
// ==========================================
pub struct MySqlTargetRepository {
    pool: MySqlPool,
}

impl MySqlTargetRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetTableRepository for MySqlTargetRepository {
    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn fetch_existing(
        &self,
        schema: &TableSchema,
        keys: &[NaturalKey],
    ) -> RepositoryResult<HashMap<NaturalKey, StoredRecord>> {
        let mut existing = HashMap::with_capacity(keys.len());

        for chunk in keys.chunks(FETCH_CHUNK_SIZE) {
            let sql = select_sql(schema, chunk.len());
            let mut query = sqlx::query(&sql);
            for key in chunk {
                for part in &key.0 {
                    query = query.bind(part.clone());
                }
            }

            let mut rows = query.fetch(&self.pool);
            while let Some(row) = rows.try_next().await? {
                let mut values = BTreeMap::new();
                for column in &schema.columns {
                    values.insert(column.name.clone(), decode_field(&row, column)?);
                }

                let key = NaturalKey(
                    schema
                        .natural_key
                        .iter()
                        .map(|k| values.get(k).unwrap_or(&FieldValue::Null).canonical())
                        .collect(),
                );
                existing.insert(key, StoredRecord { values });
            }
        }

        Ok(existing)
    }

    async fn apply_batch(
        &self,
        schema: &TableSchema,
        operations: &[UpsertOperation],
    ) -> RepositoryResult<BatchReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = BatchReport::default();
        let insert_stmt = insert_sql(schema);

        for op in operations {
            match op {
                UpsertOperation::Skip { .. } => {
                    report.skipped += 1;
                }
                UpsertOperation::Reject { row_number, reason } => {
                    // Counted here so rejects share one accounting path;
                    // nothing is executed for them.
                    report.row_rejects.push((*row_number, reason.clone()));
                }
                UpsertOperation::Insert { record } => {
                    let mut query = sqlx::query(&insert_stmt);
                    for column in &schema.columns {
                        let value = record.values.get(&column.name).unwrap_or(&FieldValue::Null);
                        query = bind_field(query, value);
                    }

                    match query.execute(&mut *tx).await {
                        Ok(_) => report.inserted += 1,
                        Err(e) => {
                            isolate_row_fault(e, record.row_number, &mut report)?;
                        }
                    }
                }
                UpsertOperation::Update {
                    key,
                    row_number,
                    changed,
                } => {
                    let columns: Vec<&String> = changed.keys().collect();
                    let sql = update_sql(schema, &columns);
                    let mut query = sqlx::query(&sql);
                    for column in &columns {
                        query = bind_field(query, &changed[*column]);
                    }
                    for part in &key.0 {
                        query = query.bind(part.clone());
                    }

                    match query.execute(&mut *tx).await {
                        Ok(_) => report.updated += 1,
                        Err(e) => {
                            isolate_row_fault(e, *row_number, &mut report)?;
                        }
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }
}

/// Row-level fault handling inside an open batch transaction: structural
/// (and otherwise unclassified statement) faults are recorded against the
/// row and execution continues; transient faults abort the batch so the
/// loader can retry it whole.
fn isolate_row_fault(
    err: sqlx::Error,
    row: usize,
    report: &mut BatchReport,
) -> RepositoryResult<()> {
    let classified = RepositoryError::from(err).with_row(row);
    if classified.is_transient() {
        return Err(classified);
    }
    report.row_rejects.push((row, classified.to_string()));
    Ok(())
}

// ==========================================
// SQL building
// ==========================================

/// SELECT with per-type CASTs so every column decodes into the engine's
/// four field types regardless of the exact MySQL column type.
fn select_sql(schema: &TableSchema, key_count: usize) -> String {
    let columns: Vec<String> = schema.columns.iter().map(select_expr).collect();

    let key_tuple = if schema.natural_key.len() == 1 {
        format!("`{}`", schema.natural_key[0])
    } else {
        format!(
            "({})",
            schema
                .natural_key
                .iter()
                .map(|k| format!("`{}`", k))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    let one_key = if schema.natural_key.len() == 1 {
        "?".to_string()
    } else {
        format!(
            "({})",
            vec!["?"; schema.natural_key.len()].join(", ")
        )
    };
    let placeholders = vec![one_key; key_count].join(", ");

    format!(
        "SELECT {} FROM `{}` WHERE {} IN ({})",
        columns.join(", "),
        schema.table,
        key_tuple,
        placeholders
    )
}

fn select_expr(column: &ColumnSpec) -> String {
    match column.column_type {
        ColumnType::Text => format!("`{0}`", column.name),
        ColumnType::Integer => format!("CAST(`{0}` AS SIGNED) AS `{0}`", column.name),
        ColumnType::Decimal => format!("CAST(`{0}` AS DOUBLE) AS `{0}`", column.name),
        ColumnType::Date => format!("CAST(`{0}` AS DATE) AS `{0}`", column.name),
    }
}

fn insert_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("`{}`", c.name))
        .collect();
    let placeholders = vec!["?"; schema.columns.len()].join(", ");

    format!(
        "INSERT INTO `{}` ({}) VALUES ({})",
        schema.table,
        columns.join(", "),
        placeholders
    )
}

fn update_sql(schema: &TableSchema, changed_columns: &[&String]) -> String {
    let assignments: Vec<String> = changed_columns
        .iter()
        .map(|c| format!("`{}` = ?", c))
        .collect();
    let conditions: Vec<String> = schema
        .natural_key
        .iter()
        .map(|k| format!("`{}` = ?", k))
        .collect();

    format!(
        "UPDATE `{}` SET {} WHERE {}",
        schema.table,
        assignments.join(", "),
        conditions.join(" AND ")
    )
}

// ==========================================
// Value binding / decoding
// ==========================================

fn bind_field<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &FieldValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        FieldValue::Text(s) => query.bind(s.clone()),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Decimal(d) => query.bind(*d),
        FieldValue::Date(d) => query.bind(*d),
        FieldValue::Null => query.bind(Option::<String>::None),
    }
}

fn decode_field(row: &MySqlRow, column: &ColumnSpec) -> RepositoryResult<FieldValue> {
    let name = column.name.as_str();
    let value = match column.column_type {
        ColumnType::Text => row
            .try_get::<Option<String>, _>(name)?
            .map(FieldValue::Text),
        ColumnType::Integer => row
            .try_get::<Option<i64>, _>(name)?
            .map(FieldValue::Integer),
        ColumnType::Decimal => row
            .try_get::<Option<f64>, _>(name)?
            .map(FieldValue::Decimal),
        ColumnType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(FieldValue::Date),
    };
    Ok(value.unwrap_or(FieldValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::table_schema::SourceMatch;

    fn test_schema() -> TableSchema {
        TableSchema {
            table: "clients".to_string(),
            source: SourceMatch {
                file_stem: "clients".to_string(),
                sheet: None,
            },
            columns: vec![
                ColumnSpec {
                    name: "id".to_string(),
                    column_type: ColumnType::Integer,
                    required: true,
                },
                ColumnSpec {
                    name: "name".to_string(),
                    column_type: ColumnType::Text,
                    required: true,
                },
                ColumnSpec {
                    name: "balance".to_string(),
                    column_type: ColumnType::Decimal,
                    required: false,
                },
            ],
            natural_key: vec!["id".to_string()],
        }
    }

    #[test]
    fn test_insert_sql_lists_all_columns() {
        assert_eq!(
            insert_sql(&test_schema()),
            "INSERT INTO `clients` (`id`, `name`, `balance`) VALUES (?, ?, ?)"
        );
    }

    #[test]
    fn test_update_sql_touches_changed_columns_only() {
        let name = "name".to_string();
        let changed = vec![&name];
        assert_eq!(
            update_sql(&test_schema(), &changed),
            "UPDATE `clients` SET `name` = ? WHERE `id` = ?"
        );
    }

    #[test]
    fn test_select_sql_single_key() {
        assert_eq!(
            select_sql(&test_schema(), 2),
            "SELECT CAST(`id` AS SIGNED) AS `id`, `name`, CAST(`balance` AS DOUBLE) AS `balance` \
             FROM `clients` WHERE `id` IN (?, ?)"
        );
    }

    #[test]
    fn test_select_sql_composite_key() {
        let mut schema = test_schema();
        schema.natural_key = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            select_sql(&schema, 2),
            "SELECT CAST(`id` AS SIGNED) AS `id`, `name`, CAST(`balance` AS DOUBLE) AS `balance` \
             FROM `clients` WHERE (`id`, `name`) IN ((?, ?), (?, ?))"
        );
    }
}
