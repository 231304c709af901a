//! Spreadsheet export for interaction logs.
//!
//! Pure transformation from an ordered record slice to a downloadable XLSX
//! byte artifact: one workbook, one sheet, the fixed header row, one data
//! row per record in input order. The input is never mutated and no file is
//! touched; callers decide where the bytes go.

use classlog_core::{format_log_timestamp, Record, INTERACTION_COLUMNS};
use rust_xlsxwriter::Workbook;

pub const SHEET_NAME: &str = "Interactions";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("workbook build failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
    #[error("record formatting failed: {0}")]
    Record(#[from] classlog_core::LogError),
}

/// Renders records into XLSX bytes.
///
/// The output is a valid, openable workbook even for an empty slice (header
/// row only). Works equally for the full durable log and an in-session
/// subset.
///
/// # Errors
/// Returns [`ExportError`] when workbook construction or timestamp
/// formatting fails.
pub fn export(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (column, name) in INTERACTION_COLUMNS.iter().enumerate() {
        sheet.write_string(0, column_index(column), *name)?;
    }

    let mut row_number: u32 = 1;
    for record in records {
        sheet.write_string(row_number, 0, record.student_name.as_str())?;
        sheet.write_string(row_number, 1, record.prompt.as_str())?;
        sheet.write_string(row_number, 2, record.response.as_str())?;
        sheet.write_string(row_number, 3, format_log_timestamp(record.timestamp)?)?;
        if let Some(score) = record.score {
            sheet.write_number(row_number, 4, f64::from(score))?;
        }
        row_number += 1;
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_index(column: usize) -> u16 {
    u16::try_from(column).unwrap_or(u16::MAX)
}
