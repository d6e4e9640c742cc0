// ==========================================
// Planilha Import Engine - Row Validator
// ==========================================
// Converts raw cells into typed fields per the table
// contract. Owns the whole type-coercion table; no
// coercion happens anywhere else. Locale conventions
// (decimal comma, day-first dates) are configured,
// ambiguous literals fail closed.
// ==========================================

use crate::config::run_config::LocaleConfig;
use crate::config::table_schema::TableSchema;
use crate::domain::record::{NaturalKey, NormalizedRecord, RawRow};
use crate::domain::types::{CellValue, ColumnType, FieldValue};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_engine_trait::RowValidator as RowValidatorTrait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub struct RowValidator {
    locale: LocaleConfig,
}

impl RowValidator {
    pub fn new(locale: LocaleConfig) -> Self {
        Self { locale }
    }
}

impl RowValidatorTrait for RowValidator {
    /// Validate one raw row against the table contract.
    ///
    /// Every schema column receives a typed value (Null when the sheet has
    /// no such column or the cell is empty). The first violating column
    /// rejects the whole row; no partially-normalized record escapes.
    fn validate(
        &self,
        row: &RawRow,
        headers: &[String],
        schema: &TableSchema,
    ) -> ImportResult<NormalizedRecord> {
        let mut values = BTreeMap::new();

        for column in &schema.columns {
            let cell = find_cell(row, headers, &column.name);

            let value = self.coerce(cell, column.column_type).map_err(|message| {
                ImportError::ValidationRejected {
                    row: row.row_number,
                    reason: format!("column \"{}\": {}", column.name, message),
                }
            })?;

            if column.required && value.is_null() {
                return Err(ImportError::ValidationRejected {
                    row: row.row_number,
                    reason: format!("column \"{}\": required but empty", column.name),
                });
            }

            values.insert(column.name.clone(), value);
        }

        // The natural key must be fully populated to match existing rows
        let mut key_parts = Vec::with_capacity(schema.natural_key.len());
        for key_column in &schema.natural_key {
            let value = values.get(key_column).unwrap_or(&FieldValue::Null);
            if value.is_null() {
                return Err(ImportError::ValidationRejected {
                    row: row.row_number,
                    reason: format!("column \"{}\": natural key must not be empty", key_column),
                });
            }
            key_parts.push(value.canonical());
        }

        Ok(NormalizedRecord {
            values,
            key: NaturalKey(key_parts),
            row_number: row.row_number,
        })
    }
}

impl RowValidator {
    // ==========================================
    // Per-column coercion table
    // ==========================================
    fn coerce(&self, cell: &CellValue, target: ColumnType) -> Result<FieldValue, String> {
        if cell.is_blank() {
            return Ok(FieldValue::Null);
        }

        match target {
            ColumnType::Text => Ok(self.coerce_text(cell)),
            ColumnType::Integer => self.coerce_integer(cell),
            ColumnType::Decimal => self.coerce_decimal(cell),
            ColumnType::Date => self.coerce_date(cell),
        }
    }

    /// Any scalar renders as trimmed text; spreadsheets routinely store
    /// identifier-like text (codes, phone numbers) as numeric cells.
    fn coerce_text(&self, cell: &CellValue) -> FieldValue {
        let text = cell.to_string().trim().to_string();
        if text.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(text)
        }
    }

    fn coerce_integer(&self, cell: &CellValue) -> Result<FieldValue, String> {
        match cell {
            CellValue::Integer(i) => Ok(FieldValue::Integer(*i)),
            CellValue::Float(f) if f.fract() == 0.0 => Ok(FieldValue::Integer(*f as i64)),
            CellValue::Float(f) => Err(format!("expected integer, got number \"{}\"", f)),
            CellValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("expected integer, got text \"{}\"", s.trim())),
            other => Err(format!("expected integer, got {}", other.type_label())),
        }
    }

    fn coerce_decimal(&self, cell: &CellValue) -> Result<FieldValue, String> {
        match cell {
            CellValue::Integer(i) => Ok(FieldValue::Decimal(*i as f64)),
            CellValue::Float(f) => Ok(FieldValue::Decimal(*f)),
            CellValue::Text(s) => parse_decimal(s.trim(), self.locale.decimal_comma)
                .map(FieldValue::Decimal)
                .ok_or_else(|| format!("expected decimal, got text \"{}\"", s.trim())),
            other => Err(format!("expected decimal, got {}", other.type_label())),
        }
    }

    fn coerce_date(&self, cell: &CellValue) -> Result<FieldValue, String> {
        match cell {
            CellValue::DateTime(dt) => Ok(FieldValue::Date(dt.date())),
            CellValue::Text(s) => parse_date(s.trim(), self.locale.day_first_dates)
                .map(FieldValue::Date)
                .ok_or_else(|| format!("expected date, got text \"{}\"", s.trim())),
            other => Err(format!("expected date, got {}", other.type_label())),
        }
    }
}

/// Positional lookup of a schema column in the sheet headers
/// (case-insensitive). Absent column or short row reads as Empty.
fn find_cell<'a>(row: &'a RawRow, headers: &[String], column: &str) -> &'a CellValue {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .and_then(|idx| row.cells.get(idx))
        .unwrap_or(&CellValue::Empty)
}

// ==========================================
// Locale-aware literal parsing
// ==========================================

/// Parse a decimal literal under one configured convention.
///
/// decimal_comma = true:  "1.234,56"  "1234,56"  "1.234"(=1234)  "12"
/// decimal_comma = false: "1,234.56"  "1234.56"  "1,234"(=1234)  "12"
///
/// A literal that contradicts the convention (wrong separator order,
/// malformed grouping) returns None: fail closed, never guess.
fn parse_decimal(text: &str, decimal_comma: bool) -> Option<f64> {
    let (group_sep, decimal_sep) = if decimal_comma { ('.', ',') } else { (',', '.') };

    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text),
    };
    if body.is_empty() {
        return None;
    }

    let mut parts = body.splitn(2, decimal_sep);
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    // The fraction side may not contain any separator
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let int_digits = if int_part.contains(group_sep) {
        // Grouped integer part: 1-3 digits, then exact groups of 3
        let groups: Vec<&str> = int_part.split(group_sep).collect();
        if groups[0].is_empty()
            || groups[0].len() > 3
            || !groups[0].chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        for group in &groups[1..] {
            if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
        }
        groups.concat()
    } else {
        if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        int_part.to_string()
    };

    let normalized = match frac_part {
        Some(frac) => format!("{}.{}", int_digits, frac),
        None => int_digits,
    };
    normalized.parse::<f64>().ok().map(|v| sign * v)
}

/// Parse a date literal. ISO `YYYY-MM-DD` and compact `YYYYMMDD` are
/// always accepted; `dd/mm/YYYY` and `dd.mm.YYYY` only when day-first
/// is configured. Everything else returns None (fail closed).
fn parse_date(text: &str, day_first: bool) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if text.len() == 8 && text.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y%m%d") {
            return Some(date);
        }
    }
    if day_first {
        for format in ["%d/%m/%Y", "%d.%m.%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return Some(date);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::table_schema::{ColumnSpec, SourceMatch};

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
                ColumnSpec {
                    name: "since".to_string(),
                    column_type: ColumnType::Date,
                    required: false,
                },
            ],
            natural_key: vec!["id".to_string()],
        }
    }

    fn headers() -> Vec<String> {
        vec![
            "id".to_string(),
            "name".to_string(),
            "balance".to_string(),
            "since".to_string(),
        ]
    }

    fn text_row(row_number: usize, cells: &[&str]) -> RawRow {
        RawRow {
            row_number,
            cells: cells
                .iter()
                .map(|c| {
                    if c.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(c.to_string())
                    }
                })
                .collect(),
        }
    }

    fn validator() -> RowValidator {
        RowValidator::new(LocaleConfig {
            decimal_comma: true,
            day_first_dates: true,
        })
    }

    #[test]
    fn test_validate_basic_row() {
        let record = validator()
            .validate(
                &text_row(2, &["1", "  Ana  ", "1.234,56", "20/01/2025"]),
                &headers(),
                &test_schema(),
            )
            .unwrap();

        assert_eq!(record.key, NaturalKey(vec!["1".to_string()]));
        assert_eq!(record.values["id"], FieldValue::Integer(1));
        assert_eq!(record.values["name"], FieldValue::Text("Ana".to_string()));
        assert_eq!(record.values["balance"], FieldValue::Decimal(1234.56));
        assert_eq!(
            record.values["since"],
            FieldValue::Date(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap())
        );
    }

    #[test]
    fn test_validate_missing_required_column() {
        let err = validator()
            .validate(&text_row(3, &["1", "", "10,0", ""]), &headers(), &test_schema())
            .unwrap_err();

        match err {
            ImportError::ValidationRejected { row, reason } => {
                assert_eq!(row, 3);
                assert!(reason.contains("\"name\""), "reason: {}", reason);
                assert!(reason.contains("required"), "reason: {}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_mistyped_decimal() {
        let err = validator()
            .validate(
                &text_row(4, &["1", "Ana", "abc", ""]),
                &headers(),
                &test_schema(),
            )
            .unwrap_err();

        match err {
            ImportError::ValidationRejected { reason, .. } => {
                assert!(
                    reason.contains("column \"balance\": expected decimal"),
                    "reason: {}",
                    reason
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_empty_natural_key() {
        let mut schema = test_schema();
        schema.columns[0].required = false;

        let err = validator()
            .validate(&text_row(5, &["", "Ana", "", ""]), &headers(), &schema)
            .unwrap_err();

        match err {
            ImportError::ValidationRejected { reason, .. } => {
                assert!(reason.contains("natural key"), "reason: {}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_extra_columns_ignored_missing_optional_null() {
        let record = validator()
            .validate(
                &text_row(2, &["1", "Ana"]),
                &["id".to_string(), "name".to_string()],
                &test_schema(),
            )
            .unwrap();

        assert_eq!(record.values["balance"], FieldValue::Null);
        assert_eq!(record.values["since"], FieldValue::Null);
    }

    #[test]
    fn test_coerce_integer_from_integral_float() {
        // Excel represents most numbers as floats
        let record = validator()
            .validate(
                &RawRow {
                    row_number: 2,
                    cells: vec![
                        CellValue::Float(7.0),
                        CellValue::Text("Ana".to_string()),
                        CellValue::Empty,
                        CellValue::Empty,
                    ],
                },
                &headers(),
                &test_schema(),
            )
            .unwrap();
        assert_eq!(record.values["id"], FieldValue::Integer(7));
    }

    #[test]
    fn test_coerce_integer_rejects_fractional_float() {
        let err = validator()
            .validate(
                &RawRow {
                    row_number: 2,
                    cells: vec![
                        CellValue::Float(7.5),
                        CellValue::Text("Ana".to_string()),
                        CellValue::Empty,
                        CellValue::Empty,
                    ],
                },
                &headers(),
                &test_schema(),
            )
            .unwrap_err();
        assert!(matches!(err, ImportError::ValidationRejected { .. }));
    }

    #[test]
    fn test_parse_decimal_comma_convention() {
        assert_eq!(parse_decimal("1234,56", true), Some(1234.56));
        assert_eq!(parse_decimal("1.234,56", true), Some(1234.56));
        assert_eq!(parse_decimal("1.234.567,89", true), Some(1234567.89));
        assert_eq!(parse_decimal("1.234", true), Some(1234.0));
        assert_eq!(parse_decimal("-12,5", true), Some(-12.5));
        assert_eq!(parse_decimal("12", true), Some(12.0));

        // Contradicts the convention: fail closed
        assert_eq!(parse_decimal("1,234.56", true), None);
        assert_eq!(parse_decimal("12.5", true), None);
        assert_eq!(parse_decimal("1.23,4", true), None);
    }

    #[test]
    fn test_parse_decimal_point_convention() {
        assert_eq!(parse_decimal("1234.56", false), Some(1234.56));
        assert_eq!(parse_decimal("1,234.56", false), Some(1234.56));
        assert_eq!(parse_decimal("-0.5", false), Some(-0.5));

        assert_eq!(parse_decimal("1.234,56", false), None);
        assert_eq!(parse_decimal("12,5", false), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(parse_date("2025-01-20", true), Some(expected));
        assert_eq!(parse_date("20250120", true), Some(expected));
        assert_eq!(parse_date("20/01/2025", true), Some(expected));
        assert_eq!(parse_date("20.01.2025", true), Some(expected));

        // Slash dates reject unless day-first is configured
        assert_eq!(parse_date("20/01/2025", false), None);
        assert_eq!(parse_date("2025-01-20", false), Some(expected));

        // Garbage and impossible dates reject
        assert_eq!(parse_date("tomorrow", true), None);
        assert_eq!(parse_date("32/01/2025", true), None);
    }
}
