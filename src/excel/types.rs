use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Information about a sheet in an Excel file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInfo {
    pub name: String,
    pub index: u32,
    pub row_count: u32,
    pub col_count: u32,
}

/// Selects a sheet either by its name or by its position in the workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
}

impl SheetSelector {
    /// Resolve the selector against the workbook's sheet names
    pub fn resolve<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        match self {
            SheetSelector::Name(name) => names.iter().find(|n| *n == name).map(|n| n.as_str()),
            SheetSelector::Index(index) => names.get(*index).map(|n| n.as_str()),
        }
    }
}

impl std::fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetSelector::Name(name) => write!(f, "{}", name),
            SheetSelector::Index(index) => write!(f, "#{}", index),
        }
    }
}

impl From<&str> for SheetSelector {
    fn from(name: &str) -> Self {
        SheetSelector::Name(name.to_string())
    }
}

impl From<usize> for SheetSelector {
    fn from(index: usize) -> Self {
        SheetSelector::Index(index)
    }
}

/// Represents a cell value with type information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Boolean(bool),
    DateTime(String), // ISO 8601 format
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric interpretation of the cell, if it has one.
    ///
    /// Text counts when it parses as a float after trimming. Booleans read as 1/0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if !n.is_nan() => Some(*n),
            CellValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Trimmed text rendering; empty for blanks
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::DateTime(dt) => dt.clone(),
            CellValue::Error(e) => format!("#{}", e),
        }
    }
}

/// Rectangular grid of raw cell values read from one sheet.
///
/// Coordinates are 0-based and physical: `(0, 0)` is cell A1 regardless of
/// where the sheet's used range begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub sheet: String,
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl Grid {
    /// Build a grid from rows, padding short rows with empty cells
    pub fn new(sheet: impl Into<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, CellValue::Empty);
        }
        Grid {
            sheet: sheet.into(),
            rows,
            width,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.width
    }

    /// Cell at `(row, col)`; out-of-range reads are empty
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }
}

/// Excel-specific errors
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExcelError {
    pub message: String,
    pub error_type: ExcelErrorType,
    pub diagnostics: Option<MatchDiagnostics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExcelErrorType {
    FileNotFound,
    InvalidFormat,
    SheetNotFound,
    ReadError,
    WriteError,
    InvalidConfig,
    Structure,
    WriteBackMismatch,
}

impl ExcelError {
    pub fn new(message: impl Into<String>, error_type: ExcelErrorType) -> Self {
        ExcelError {
            message: message.into(),
            error_type,
            diagnostics: None,
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        ExcelError::new(format!("File not found: {}", path), ExcelErrorType::FileNotFound)
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        ExcelError::new(message, ExcelErrorType::InvalidFormat)
    }

    pub fn sheet_not_found(sheet: &str) -> Self {
        ExcelError::new(format!("Sheet not found: {}", sheet), ExcelErrorType::SheetNotFound)
    }

    pub fn read_error(message: impl Into<String>) -> Self {
        ExcelError::new(message, ExcelErrorType::ReadError)
    }

    pub fn write_error(message: impl Into<String>) -> Self {
        ExcelError::new(message, ExcelErrorType::WriteError)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        ExcelError::new(message, ExcelErrorType::InvalidConfig)
    }

    pub fn structure(message: impl Into<String>) -> Self {
        ExcelError::new(message, ExcelErrorType::Structure)
    }

    pub fn write_back_mismatch(diagnostics: MatchDiagnostics) -> Self {
        ExcelError {
            message: diagnostics.to_string(),
            error_type: ExcelErrorType::WriteBackMismatch,
            diagnostics: Some(diagnostics),
        }
    }

    pub fn is_structure(&self) -> bool {
        self.error_type == ExcelErrorType::Structure
    }
}

/// Context attached to a write-back that matched nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDiagnostics {
    pub data_keys: usize,
    pub sheet_keys: usize,
    pub data_columns: usize,
    pub columns_matched: usize,
    pub sheet_columns: usize,
    pub sample_sheet_keys: Vec<String>,
    pub sample_data_keys: Vec<String>,
    pub sample_sheet_columns: Vec<String>,
}

impl std::fmt::Display for MatchDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "No cells written: row or column mismatch. \
             Data has {} keyed rows, sheet map has {}. \
             Data columns matched: {} of {} (sheet has {} metric cols). \
             Sample sheet rows: {:?}. Sample data rows: {:?}. Sample sheet cols: {:?}.",
            self.data_keys,
            self.sheet_keys,
            self.columns_matched,
            self.data_columns,
            self.sheet_columns,
            self.sample_sheet_keys,
            self.sample_data_keys,
            self.sample_sheet_columns,
        )
    }
}
