//! The spreadsheet collaborator.
//!
//! The rest of the application only sees the [`Spreadsheet`] trait:
//! load, read records, write cells back, save. The file format behind
//! it is a CSV with a header row; data rows are addressed 1-based, the
//! same numbering [`Record::source_row`] carries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use autot1_core_types::Record;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("column {0:?} not found in header row")]
    MissingColumn(String),

    #[error("row {row} is out of range (sheet has {rows} data rows)")]
    RowOutOfRange { row: u32, rows: usize },
}

pub trait Spreadsheet: Send {
    fn headers(&self) -> &[String];
    fn row_count(&self) -> usize;

    /// All data rows, padded to header width.
    fn read_all_rows(&self) -> Vec<Vec<String>>;

    /// Records from `key_column`, skipping rows whose key cell is
    /// empty. `source_row` is the 1-based data row.
    fn read_records(&self, key_column: &str) -> Result<Vec<Record>, SheetError>;

    /// Append any of `names` missing from the header row.
    fn ensure_columns(&mut self, names: &[&str]);

    fn write_cell(&mut self, row: u32, column: &str, value: &str) -> Result<(), SheetError>;

    fn write_row(&mut self, row: u32, values: &[String]) -> Result<(), SheetError>;

    fn save(&self) -> Result<(), SheetError>;

    /// Release the backing store. Defaults to a no-op for formats with
    /// nothing to release.
    fn close(&mut self) -> Result<(), SheetError> {
        Ok(())
    }
}

pub struct CsvSheet {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvSheet {
    /// Open an existing sheet, or create one carrying `default_headers`
    /// when the file is absent and `create_if_missing` is set.
    pub fn load(
        path: impl AsRef<Path>,
        create_if_missing: bool,
        default_headers: &[&str],
    ) -> Result<Self, SheetError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            if !create_if_missing {
                return Err(SheetError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )));
            }
            let sheet = Self {
                path,
                headers: default_headers.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            };
            sheet.save()?;
            info!(path = %sheet.path.display(), "created new sheet");
            return Ok(sheet);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        let mut records = reader.records();

        let headers: Vec<String> = match records.next() {
            Some(first) => first?.iter().map(|f| f.to_string()).collect(),
            None => default_headers.iter().map(|h| h.to_string()).collect(),
        };

        let width = headers.len();
        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        debug!(path = %path.display(), rows = rows.len(), "sheet loaded");
        Ok(Self {
            path,
            headers,
            rows,
        })
    }

    fn column_index(&self, name: &str) -> Result<usize, SheetError> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| SheetError::MissingColumn(name.to_string()))
    }

    fn row_mut(&mut self, row: u32) -> Result<&mut Vec<String>, SheetError> {
        if row == 0 || row as usize > self.rows.len() {
            return Err(SheetError::RowOutOfRange {
                row,
                rows: self.rows.len(),
            });
        }
        Ok(&mut self.rows[row as usize - 1])
    }
}

impl Spreadsheet for CsvSheet {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn read_all_rows(&self) -> Vec<Vec<String>> {
        self.rows.clone()
    }

    fn read_records(&self, key_column: &str) -> Result<Vec<Record>, SheetError> {
        let key = self.column_index(key_column)?;
        let mut records = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let value = row.get(key).map(String::as_str).unwrap_or("").trim();
            if value.is_empty() {
                continue;
            }
            records.push(Record::with_row(value, i as u32 + 1));
        }
        Ok(records)
    }

    fn ensure_columns(&mut self, names: &[&str]) {
        for name in names {
            if self
                .headers
                .iter()
                .any(|h| h.eq_ignore_ascii_case(name))
            {
                continue;
            }
            self.headers.push(name.to_string());
            for row in &mut self.rows {
                row.push(String::new());
            }
        }
    }

    fn write_cell(&mut self, row: u32, column: &str, value: &str) -> Result<(), SheetError> {
        let col = self.column_index(column)?;
        let row = self.row_mut(row)?;
        row[col] = value.to_string();
        Ok(())
    }

    fn write_row(&mut self, row: u32, values: &[String]) -> Result<(), SheetError> {
        let width = self.headers.len();
        let target = self.row_mut(row)?;
        for (i, value) in values.iter().take(width).enumerate() {
            target[i] = value.clone();
        }
        Ok(())
    }

    fn save(&self) -> Result<(), SheetError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!(path = %self.path.display(), "sheet saved");
        Ok(())
    }

    /// A final save; the file handle itself is per-save, so there is
    /// nothing else to let go of.
    fn close(&mut self) -> Result<(), SheetError> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: &[&str] = &["MRN", "Status", "Detail"];

    fn sheet_with(content: &str, dir: &tempfile::TempDir) -> CsvSheet {
        let path = dir.path().join("records.csv");
        fs::write(&path, content).unwrap();
        CsvSheet::load(&path, false, HEADERS).unwrap()
    }

    #[test]
    fn missing_file_without_create_flag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvSheet::load(dir.path().join("absent.csv"), false, HEADERS);
        assert!(matches!(result, Err(SheetError::Io(_))));
    }

    #[test]
    fn create_if_missing_writes_the_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.csv");
        let sheet = CsvSheet::load(&path, true, HEADERS).unwrap();
        assert_eq!(sheet.row_count(), 0);

        let reloaded = CsvSheet::load(&path, false, &[]).unwrap();
        assert_eq!(reloaded.headers(), &["MRN", "Status", "Detail"]);
    }

    #[test]
    fn records_skip_rows_with_empty_keys() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = sheet_with("MRN,Status,Detail\n24IT01,,\n,,\n24IT02,,\n", &dir);
        let records = sheet.read_records("MRN").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mrn, "24IT01");
        assert_eq!(records[0].source_row, Some(1));
        assert_eq!(records[1].source_row, Some(3));
    }

    #[test]
    fn key_column_lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = sheet_with("mrn,Status,Detail\n24IT01,,\n", &dir);
        assert_eq!(sheet.read_records("MRN").unwrap().len(), 1);
        assert!(matches!(
            sheet.read_records("Nope"),
            Err(SheetError::MissingColumn(_))
        ));
    }

    #[test]
    fn write_back_round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = sheet_with("MRN,Status,Detail\n24IT01,,\n", &dir);
        sheet.write_cell(1, "Status", "OK").unwrap();
        sheet.write_cell(1, "Detail", "sent").unwrap();
        sheet.save().unwrap();

        let reloaded = CsvSheet::load(dir.path().join("records.csv"), false, HEADERS).unwrap();
        assert_eq!(reloaded.read_all_rows()[0], vec!["24IT01", "OK", "sent"]);
    }

    #[test]
    fn writes_outside_the_sheet_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = sheet_with("MRN,Status,Detail\n24IT01,,\n", &dir);
        assert!(matches!(
            sheet.write_cell(0, "Status", "x"),
            Err(SheetError::RowOutOfRange { .. })
        ));
        assert!(matches!(
            sheet.write_cell(2, "Status", "x"),
            Err(SheetError::RowOutOfRange { .. })
        ));
    }

    #[test]
    fn close_persists_unsaved_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = sheet_with("MRN,Status,Detail\n24IT01,,\n", &dir);
        sheet.write_cell(1, "Status", "SENT").unwrap();
        sheet.close().unwrap();

        let reloaded = CsvSheet::load(dir.path().join("records.csv"), false, HEADERS).unwrap();
        assert_eq!(reloaded.read_all_rows()[0][1], "SENT");
    }

    #[test]
    fn ensure_columns_appends_and_pads() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = sheet_with("MRN,Status,Detail\n24IT01,,\n", &dir);
        sheet.ensure_columns(&["Status", "MessageName"]);
        assert_eq!(sheet.headers().len(), 4);
        assert_eq!(sheet.read_all_rows()[0].len(), 4);
        sheet.write_cell(1, "MessageName", "NCTS Arrival").unwrap();
        assert_eq!(sheet.read_all_rows()[0][3], "NCTS Arrival");
    }
}
