// ==========================================
// Planilha Import Engine - Spreadsheet Reader
// ==========================================
// Folder enumeration + Excel/CSV parsing into raw
// rows. Supports .xlsx / .xls / .csv. Read failures
// are attributed to the single file, never the run.
// ==========================================

use crate::domain::record::{FileKind, RawRow, SourceFile};
use crate::domain::types::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

// ==========================================
// SheetRows - one parsed sheet
// ==========================================
// headers and cells are positionally aligned; rows
// are padded/truncated to the header width. Fully
// blank rows never leave the reader.
#[derive(Debug, Clone)]
pub struct SheetRows {
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ==========================================
// Folder scan
// ==========================================

/// Enumerate supported spreadsheet files directly under `folder`, in
/// lexicographic file-name order (deterministic duplicate-key tie-breaks
/// depend on this order). A missing or unreadable folder is a setup fault.
pub fn scan_folder(folder: &Path) -> ImportResult<Vec<SourceFile>> {
    let entries = std::fs::read_dir(folder)
        .map_err(|e| ImportError::FolderUnreadable(format!("{}: {}", folder.display(), e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| ImportError::FolderUnreadable(format!("{}: {}", folder.display(), e)))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let kind = match path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileKind::from_extension)
        {
            Some(kind) => kind,
            None => continue, // not a spreadsheet, ignore silently
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let modified_at = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(chrono::DateTime::from);

        files.push(SourceFile {
            path,
            stem,
            kind,
            modified_at,
        });
    }

    files.sort_by(|a, b| a.name().cmp(&b.name()));
    Ok(files)
}

// ==========================================
// File reading
// ==========================================

/// Parse every sheet of one source file. Restartable: each call re-reads
/// from disk. Any open/parse failure maps to SourceUnreadable for this
/// file only.
pub fn read_source(source: &SourceFile) -> ImportResult<Vec<SheetRows>> {
    match source.kind {
        FileKind::Xlsx | FileKind::Xls => read_excel(source),
        FileKind::Csv => read_csv(source),
    }
}

fn unreadable(source: &SourceFile, message: impl ToString) -> ImportError {
    ImportError::SourceUnreadable {
        file: source.name(),
        message: message.to_string(),
    }
}

// ==========================================
// Excel (.xlsx / .xls)
// ==========================================
fn read_excel(source: &SourceFile) -> ImportResult<Vec<SheetRows>> {
    let mut workbook =
        open_workbook_auto(&source.path).map_err(|e| unreadable(source, e))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(unreadable(source, "workbook has no worksheets"));
    }

    let mut sheets = Vec::new();
    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| unreadable(source, format!("sheet {}: {}", sheet_name, e)))?;

        let mut rows_iter = range.rows().enumerate();

        // First non-blank row is the header row
        let headers: Vec<String> = loop {
            match rows_iter.next() {
                Some((_, cells)) if cells.iter().any(|c| !matches!(c, Data::Empty)) => {
                    break cells.iter().map(|c| c.to_string().trim().to_string()).collect();
                }
                Some(_) => continue,
                // Entirely empty sheet: nothing to import from it
                None => break Vec::new(),
            }
        };
        if headers.is_empty() {
            continue;
        }

        let mut rows = Vec::new();
        for (idx, cells) in rows_iter {
            let mut row = RawRow {
                row_number: idx + 1,
                cells: cells.iter().map(convert_cell).collect(),
            };
            row.cells.resize(headers.len(), CellValue::Empty);

            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        sheets.push(SheetRows {
            sheet: sheet_name,
            headers,
            rows,
        });
    }

    Ok(sheets)
}

/// Excel cell -> tagged CellValue. The only place calamine types appear.
fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::DateTime(naive),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
    }
}

// ==========================================
// CSV
// ==========================================
fn read_csv(source: &SourceFile) -> ImportResult<Vec<SheetRows>> {
    let mut file = File::open(&source.path).map_err(|e| unreadable(source, e))?;

    let delimiter = sniff_delimiter(&mut file).map_err(|e| unreadable(source, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| unreadable(source, e))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true) // tolerate ragged rows
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(source, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(unreadable(source, "missing header row"));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| unreadable(source, e))?;

        let mut cells: Vec<CellValue> = record
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(v.to_string())
                }
            })
            .collect();
        cells.resize(headers.len(), CellValue::Empty);

        // Header occupies row 1; data starts at row 2
        let row = RawRow {
            row_number: idx + 2,
            cells,
        };
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(vec![SheetRows {
        sheet: "csv".to_string(),
        headers,
        rows,
    }])
}

/// Pick the CSV delimiter from the header line. pt-BR exports commonly
/// use `;` (comma is the decimal separator); fall back to `,`.
fn sniff_delimiter(file: &mut File) -> std::io::Result<u8> {
    let mut first_line = String::new();
    BufReader::new(&mut *file).read_line(&mut first_line)?;

    let candidates: [(u8, usize); 3] = [
        (b';', first_line.matches(';').count()),
        (b',', first_line.matches(',').count()),
        (b'\t', first_line.matches('\t').count()),
    ];
    Ok(candidates
        .iter()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count > 0)
        .map(|(d, _)| *d)
        .unwrap_or(b','))
}
