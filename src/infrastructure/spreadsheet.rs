//! Spreadsheet reader
//!
//! Returns the first worksheet as string cells with the header row dropped.
//! Trailing empty cells of each row are trimmed, so a row's length reflects
//! its last populated column.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetError {
    #[error("cannot open {path}: {message}")]
    Open { path: String, message: String },

    #[error("{path} has no worksheet")]
    NoSheet { path: String },

    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
}

pub trait SpreadsheetReader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Vec<Vec<String>>, SpreadsheetError>;
}

/// xlsx/xls reader (calamine)
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxReader;

impl SpreadsheetReader for XlsxReader {
    fn open(&self, path: &Path) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        let display = path.display().to_string();
        let mut workbook = open_workbook_auto(path).map_err(|e| SpreadsheetError::Open {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SpreadsheetError::NoSheet { path: display.clone() })?
            .map_err(|e| SpreadsheetError::Read {
                path: display.clone(),
                message: e.to_string(),
            })?;

        Ok(range
            .rows()
            .skip(1)
            .map(|row| trim_trailing_empty(row.iter().map(cell_text).collect()))
            .collect())
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTime(dt) => dt.as_datetime().map_or_else(
            || dt.as_f64().to_string(),
            |value| value.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        other => other.to_string(),
    }
}

fn trim_trailing_empty(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}
