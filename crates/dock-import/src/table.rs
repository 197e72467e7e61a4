use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};

use crate::ImportError;

/// A decoded upload: normalized header names plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with [`ImportError::MissingColumn`] for the first absent column.
    pub fn require_columns(&self, names: &[&str]) -> Result<(), ImportError> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(ImportError::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }
}

/// One data row. `number` counts the header as row 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub number: usize,
    cells: HashMap<String, String>,
}

impl Row {
    pub fn new(number: usize, cells: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            number,
            cells: cells.into_iter().collect(),
        }
    }

    /// Trimmed cell value; blank cells and absent columns are both `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

/// Decode an upload by filename: `.csv` as text, `.xlsx` / `.xls` as a
/// workbook.
pub fn parse_upload(filename: &str, bytes: &[u8]) -> Result<Table, ImportError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => parse_csv_str(&decode_text(bytes)),
        Some("xlsx" | "xls") => parse_workbook(bytes),
        _ => Err(ImportError::UnsupportedFileType {
            filename: filename.to_string(),
        }),
    }
}

/// UTF-8 (BOM stripped) with a Latin-1 fallback. Latin-1 maps every byte to a
/// code point, so decoding never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Parse CSV text into a [`Table`]. Fully blank rows are skipped but still
/// consume a row number.
pub fn parse_csv_str(src: &str) -> Result<Table, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(src.as_bytes());

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| ImportError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| ImportError::Csv(e.to_string()))?;
        let cells = columns
            .iter()
            .cloned()
            .zip(rec.iter().map(str::to_string));
        let row = Row::new(idx + 2, cells);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(Table { columns, rows })
}

/// Read the first sheet of a workbook into a [`Table`]. Row numbers are the
/// sheet's own, so a header on row 1 numbers data rows as CSV does.
pub fn parse_workbook(bytes: &[u8]) -> Result<Table, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Workbook("workbook has no sheets".to_string()))?
        .map_err(|e| ImportError::Workbook(e.to_string()))?;

    let header_row = range.start().map_or(1, |(r, _)| r as usize + 1);
    let mut records = range.rows();
    let columns: Vec<String> = records
        .next()
        .map(|header| {
            header
                .iter()
                .map(|c| cell_text(c).trim().to_lowercase())
                .collect()
        })
        .unwrap_or_default();

    let mut rows = Vec::new();
    for (idx, rec) in records.enumerate() {
        let cells = columns.iter().cloned().zip(rec.iter().map(cell_text));
        let row = Row::new(header_row + idx + 1, cells);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(Table { columns, rows })
}

/// Cell as the text a CSV export would carry. Whole floats print without a
/// fraction; error cells read as blank.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_trimmed_and_lowercased() {
        let t = parse_csv_str(" Name ,YEAR\nAurora,2001\n").unwrap();
        assert_eq!(t.columns, vec!["name", "year"]);
        assert_eq!(t.rows[0].get("name"), Some("Aurora"));
        assert_eq!(t.rows[0].get("year"), Some("2001"));
    }

    #[test]
    fn row_numbers_count_header_as_one() {
        let t = parse_csv_str("name\na\n,\nb\n").unwrap();
        let numbers: Vec<usize> = t.rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn short_records_leave_trailing_columns_absent() {
        let t = parse_csv_str("name,make,model\nAurora,Hatteras\n").unwrap();
        assert_eq!(t.rows[0].get("make"), Some("Hatteras"));
        assert_eq!(t.rows[0].get("model"), None);
    }

    #[test]
    fn bom_is_stripped() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(b"name\nAurora\n");
        let t = parse_upload("fleet.csv", &bytes).unwrap();
        assert_eq!(t.columns, vec!["name"]);
    }

    #[test]
    fn latin1_fallback_decodes_high_bytes() {
        // "Côte" in Latin-1 is not valid UTF-8.
        let bytes = b"name\nC\xF4te\n";
        let t = parse_upload("fleet.CSV", bytes).unwrap();
        assert_eq!(t.rows[0].get("name"), Some("Côte"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        for name in ["fleet", "fleet.txt", "fleet.ods"] {
            assert!(matches!(
                parse_upload(name, b"name\n"),
                Err(ImportError::UnsupportedFileType { .. })
            ));
        }
    }

    #[test]
    fn csv_bytes_named_xlsx_are_not_a_workbook() {
        assert!(matches!(
            parse_upload("fleet.xlsx", b"name\nAurora\n"),
            Err(ImportError::Workbook(_))
        ));
    }

    #[test]
    fn cell_text_matches_csv_spelling() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(2004.5)), "2004.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
