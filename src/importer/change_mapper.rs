// ==========================================
// Planilha Import Engine - Change Mapper
// ==========================================
// Decides insert vs update vs skip per normalized
// record. Duplicate natural keys inside one file:
// the later row (file-then-row order) wins, earlier
// rows are skipped as superseded. Store lookups are
// batched by the engine; this stage never queries.
// ==========================================

use crate::config::table_schema::TableSchema;
use crate::domain::record::{NaturalKey, NormalizedRecord, StoredRecord, UpsertOperation};
use crate::domain::types::{FieldValue, SkipReason};
use crate::importer::import_engine_trait::ChangeMapper as ChangeMapperTrait;
use std::collections::{BTreeMap, HashMap};

pub struct ChangeMapper {
    // Run-level applied state: table -> key -> values as applied.
    // Keeps idempotent/tie-break semantics across files without
    // re-querying the store for keys this run already wrote.
    applied: HashMap<String, HashMap<NaturalKey, BTreeMap<String, FieldValue>>>,
}

impl ChangeMapper {
    pub fn new() -> Self {
        Self {
            applied: HashMap::new(),
        }
    }
}

impl ChangeMapperTrait for ChangeMapper {
    /// Map one file's validated records to upsert operations.
    ///
    /// `existing` is the batched store lookup for exactly these records'
    /// natural keys. Operations come out in original row order, one per
    /// record.
    fn map_records(
        &mut self,
        schema: &TableSchema,
        records: Vec<NormalizedRecord>,
        existing: &HashMap<NaturalKey, StoredRecord>,
    ) -> Vec<UpsertOperation> {
        // Last occurrence of each key inside this file wins
        let mut last_row_for_key: HashMap<&NaturalKey, usize> = HashMap::new();
        for record in &records {
            last_row_for_key.insert(&record.key, record.row_number);
        }

        let superseded: Vec<bool> = records
            .iter()
            .map(|r| last_row_for_key[&r.key] != r.row_number)
            .collect();
        drop(last_row_for_key);

        let table_state = self.applied.entry(schema.table.clone()).or_default();

        let mut operations = Vec::with_capacity(records.len());
        for (record, is_superseded) in records.into_iter().zip(superseded) {
            if is_superseded {
                operations.push(UpsertOperation::Skip {
                    key: record.key,
                    row_number: record.row_number,
                    reason: SkipReason::SupersededByLaterRow,
                });
                continue;
            }

            let current = table_state
                .get(&record.key)
                .cloned()
                .or_else(|| existing.get(&record.key).map(|s| s.values.clone()));

            match current {
                None => {
                    table_state.insert(record.key.clone(), record.values.clone());
                    operations.push(UpsertOperation::Insert { record });
                }
                Some(stored) => {
                    let changed = changed_fields(schema, &record.values, &stored);
                    if changed.is_empty() {
                        operations.push(UpsertOperation::Skip {
                            key: record.key,
                            row_number: record.row_number,
                            reason: SkipReason::IdenticalToStored,
                        });
                    } else {
                        let mut merged = stored;
                        for (name, value) in &changed {
                            merged.insert(name.clone(), value.clone());
                        }
                        table_state.insert(record.key.clone(), merged);
                        operations.push(UpsertOperation::Update {
                            key: record.key,
                            row_number: record.row_number,
                            changed,
                        });
                    }
                }
            }
        }

        operations
    }
}

impl Default for ChangeMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-key fields whose incoming value differs from the stored one.
/// A column absent from the stored row counts as differing.
fn changed_fields(
    schema: &TableSchema,
    incoming: &BTreeMap<String, FieldValue>,
    stored: &BTreeMap<String, FieldValue>,
) -> BTreeMap<String, FieldValue> {
    let mut changed = BTreeMap::new();
    for column in schema.value_columns() {
        let new_value = incoming.get(&column.name).unwrap_or(&FieldValue::Null);
        let old_value = stored.get(&column.name).unwrap_or(&FieldValue::Null);
        if new_value != old_value {
            changed.insert(column.name.clone(), new_value.clone());
        }
    }
    changed
}
