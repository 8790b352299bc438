//! Write-back of record values into an existing sheet layout.
//!
//! Keys and columns of the incoming table are resolved against the target
//! sheet's coordinate index through ordered matching strategies, so source
//! and target files may spell sections and headers slightly differently.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::extract::{
    build_coordinate_index, extract_sheet, CoordinateIndex, RecordKey, RecordTable, TableShape,
};
use super::reconcile::relabel_columns;
use crate::config::EngineConfig;
use crate::excel::{
    compute_checksum, load_grid, open_workbook, save_atomic, set_number, ExcelError, MatchDiagnostics,
    SheetSelector,
};

/// Resolves a record key to a physical row of the target sheet
pub trait KeyMatcher {
    fn resolve(&self, key: &RecordKey, index: &CoordinateIndex) -> Option<usize>;
}

/// Resolves a metric column label to a physical column of the target sheet
pub trait ColumnMatcher {
    fn resolve(&self, column: &str, index: &CoordinateIndex) -> Option<usize>;
}

/// Exact `(section, name)` equality
pub struct ExactKey;

impl KeyMatcher for ExactKey {
    fn resolve(&self, key: &RecordKey, index: &CoordinateIndex) -> Option<usize> {
        index.rows.get(key).copied()
    }
}

/// Equal names, with one section label contained in the other. "pGHD" matches
/// "Pediatric Growth Hormone Deficiency (pGHD)". The first candidate in sheet
/// order wins.
pub struct SectionContainment;

impl KeyMatcher for SectionContainment {
    fn resolve(&self, key: &RecordKey, index: &CoordinateIndex) -> Option<usize> {
        let name = key.name.trim();
        let section = key.section.as_deref()?.trim();

        index
            .keys_in_sheet_order()
            .into_iter()
            .find(|(candidate, _)| {
                if candidate.name.trim() != name {
                    return false;
                }
                match candidate.section.as_deref().map(str::trim) {
                    Some(sheet_section) => sheet_section.contains(section) || section.contains(sheet_section),
                    None => false,
                }
            })
            .map(|(_, row)| row)
    }
}

/// Label equality after trimming
pub struct TrimmedColumn;

impl ColumnMatcher for TrimmedColumn {
    fn resolve(&self, column: &str, index: &CoordinateIndex) -> Option<usize> {
        let column = column.trim();
        index
            .columns
            .iter()
            .find(|(label, _)| label.trim() == column)
            .map(|(_, col)| *col)
    }
}

/// Label equality after collapsing whitespace runs
pub struct CollapsedWhitespace;

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ColumnMatcher for CollapsedWhitespace {
    fn resolve(&self, column: &str, index: &CoordinateIndex) -> Option<usize> {
        let column = collapse_whitespace(column);
        index
            .columns
            .iter()
            .find(|(label, _)| collapse_whitespace(label) == column)
            .map(|(_, col)| *col)
    }
}

/// Ordered key and column matchers; the first one that resolves wins
pub struct MatchStrategy {
    pub keys: Vec<Box<dyn KeyMatcher>>,
    pub columns: Vec<Box<dyn ColumnMatcher>>,
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy {
            keys: vec![Box::new(ExactKey), Box::new(SectionContainment)],
            columns: vec![Box::new(TrimmedColumn), Box::new(CollapsedWhitespace)],
        }
    }
}

impl MatchStrategy {
    pub fn resolve_row(&self, key: &RecordKey, index: &CoordinateIndex) -> Option<usize> {
        self.keys.iter().find_map(|m| m.resolve(key, index))
    }

    pub fn resolve_column(&self, column: &str, index: &CoordinateIndex) -> Option<usize> {
        self.columns.iter().find_map(|m| m.resolve(column, index))
    }
}

/// One planned cell write, 0-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellWrite {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritePlan {
    pub writes: Vec<CellWrite>,
    pub keys_matched: usize,
    pub keys_unmatched: usize,
    pub columns_matched: usize,
    pub columns_unmatched: usize,
}

/// Resolve every `(key, column)` of `table` to a target cell
pub fn plan_writes(table: &RecordTable, index: &CoordinateIndex, strategy: &MatchStrategy) -> WritePlan {
    let columns: Vec<(&str, Option<usize>)> = table
        .columns
        .iter()
        .map(|c| (c.as_str(), strategy.resolve_column(c, index)))
        .collect();
    let columns_matched = columns.iter().filter(|(_, col)| col.is_some()).count();

    let mut writes = Vec::new();
    let mut keys_matched = 0;
    let mut keys_unmatched = 0;

    for (key, record) in &table.records {
        let Some(row) = strategy.resolve_row(key, index) else {
            keys_unmatched += 1;
            continue;
        };
        keys_matched += 1;

        for (column, col) in &columns {
            let Some(col) = col else { continue };
            let value = record.get(column).filter(|v| !v.is_nan()).unwrap_or(0.0);
            writes.push(CellWrite {
                row,
                col: *col,
                value,
            });
        }
    }

    WritePlan {
        writes,
        keys_matched,
        keys_unmatched,
        columns_matched,
        columns_unmatched: columns.len() - columns_matched,
    }
}

fn mismatch_diagnostics(table: &RecordTable, index: &CoordinateIndex, plan: &WritePlan) -> MatchDiagnostics {
    MatchDiagnostics {
        data_keys: table.len(),
        sheet_keys: index.rows.len(),
        data_columns: table.columns.len(),
        columns_matched: plan.columns_matched,
        sheet_columns: index.columns.len(),
        sample_sheet_keys: index
            .keys_in_sheet_order()
            .into_iter()
            .take(3)
            .map(|(k, _)| k.to_string())
            .collect(),
        sample_data_keys: table.keys().take(3).map(|k| k.to_string()).collect(),
        sample_sheet_columns: index
            .column_labels()
            .into_iter()
            .take(5)
            .map(str::to_string)
            .collect(),
    }
}

/// Outcome of a write-back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    pub cells_written: usize,
    pub keys_matched: usize,
    pub keys_unmatched: usize,
    pub columns_matched: usize,
    pub columns_unmatched: usize,
    /// SHA-256 of the file after replacement
    pub checksum: String,
}

/// Write `table` into the matching cells of the target sheet and atomically
/// replace the file. Fails with full diagnostics when nothing matched.
pub fn write_back(
    path: impl AsRef<Path>,
    sheet: &SheetSelector,
    table: &RecordTable,
    config: &EngineConfig,
    strategy: &MatchStrategy,
) -> Result<WriteReport, ExcelError> {
    let path = path.as_ref();
    let grid = load_grid(path, sheet)?;
    let index = build_coordinate_index(&grid, table.shape, config)?;

    let plan = plan_writes(table, &index, strategy);
    if plan.writes.is_empty() {
        return Err(ExcelError::write_back_mismatch(mismatch_diagnostics(table, &index, &plan)));
    }

    let mut book = open_workbook(path)?;
    let worksheet = book
        .get_sheet_by_name_mut(&grid.sheet)
        .ok_or_else(|| ExcelError::sheet_not_found(&grid.sheet))?;

    for write in &plan.writes {
        set_number(worksheet, write.row, write.col, write.value);
    }

    save_atomic(&book, path)?;

    let report = WriteReport {
        cells_written: plan.writes.len(),
        keys_matched: plan.keys_matched,
        keys_unmatched: plan.keys_unmatched,
        columns_matched: plan.columns_matched,
        columns_unmatched: plan.columns_unmatched,
        checksum: compute_checksum(path)?,
    };

    info!(
        path = %path.display(),
        sheet = %grid.sheet,
        cells = report.cells_written,
        "wrote records back"
    );
    if report.keys_unmatched > 0 || report.columns_unmatched > 0 {
        warn!(
            keys_unmatched = report.keys_unmatched,
            columns_unmatched = report.columns_unmatched,
            "write-back partially matched"
        );
    }

    Ok(report)
}

/// Copy one file's sectioned records into another file's layout, relabelling
/// period-specific columns on the way.
pub fn copy_forward(
    source: impl AsRef<Path>,
    source_sheet: &SheetSelector,
    target: impl AsRef<Path>,
    target_sheet: &SheetSelector,
    config: &EngineConfig,
) -> Result<WriteReport, ExcelError> {
    let source = source.as_ref();
    let extraction = extract_sheet(source, source_sheet, TableShape::Sectioned, config)?;
    if extraction.table.is_empty() {
        return Err(ExcelError::structure(format!(
            "No records extracted from sheet {} of '{}'",
            source_sheet,
            source.display()
        )));
    }

    let relabelled = relabel_columns(&extraction.table, &config.relabel)?;
    write_back(target, target_sheet, &relabelled, config, &MatchStrategy::default())
}
