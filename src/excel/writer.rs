use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use umya_spreadsheet::{reader, writer, Spreadsheet, Worksheet};

use super::types::ExcelError;

/// Open an xlsx workbook for in-place editing, preserving formulas and formatting
pub fn open_workbook(path: &Path) -> Result<Spreadsheet, ExcelError> {
    let display = path.display().to_string();

    if !path.exists() {
        return Err(ExcelError::file_not_found(&display));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if extension != "xlsx" && extension != "xlsm" {
        return Err(ExcelError::invalid_format(format!(
            "Only xlsx workbooks can be written back: {}",
            display
        )));
    }

    reader::xlsx::read(path)
        .map_err(|e| ExcelError::read_error(format!("Failed to open workbook '{}': {}", display, e)))
}

/// Write a number into a 0-based `(row, col)` cell
pub fn set_number(worksheet: &mut Worksheet, row: usize, col: usize, value: f64) {
    // Excel uses 1-based indexing
    let row_num = row as u32 + 1;
    let col_num = col as u32 + 1;
    worksheet.get_cell_mut((col_num, row_num)).set_value_number(value);
}

/// A workbook fully written to a temp file beside its target, not yet in place.
///
/// Dropping it without [`StagedWrite::commit`] removes the temp file and leaves
/// the target untouched.
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Replace the target with the staged file
    pub fn commit(self) -> Result<(), ExcelError> {
        let target = self.target;
        self.temp.persist(&target).map_err(|e| {
            ExcelError::write_error(format!("Failed to replace '{}': {}", target.display(), e.error))
        })?;
        debug!(path = %target.display(), "replaced workbook");
        Ok(())
    }
}

/// Serialize `book` to a temp file in the target's directory
pub fn stage_workbook(book: &Spreadsheet, target: &Path) -> Result<StagedWrite, ExcelError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".sheet-recon-")
        .suffix(".xlsx")
        .tempfile_in(&dir)
        .map_err(|e| ExcelError::write_error(format!("Failed to create temp file in '{}': {}", dir.display(), e)))?;

    writer::xlsx::write_writer(book, temp.as_file_mut())
        .map_err(|e| ExcelError::write_error(format!("Failed to save workbook: {}", e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| ExcelError::write_error(format!("Failed to flush workbook: {}", e)))?;

    Ok(StagedWrite {
        temp,
        target: target.to_path_buf(),
    })
}

/// Save `book` over `target` through a same-directory temp file and rename
pub fn save_atomic(book: &Spreadsheet, target: &Path) -> Result<(), ExcelError> {
    stage_workbook(book, target)?.commit()
}
