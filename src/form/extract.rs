use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::classify::{classify_fallback_rows, classify_rows, ClassifiedRow, RowClass};
use super::locate::{header_labels, locate_header, HeaderPosition};
use super::normalize::{normalize_name, Normalized};
use crate::config::EngineConfig;
use crate::excel::{load_grid, ExcelError, Grid, SheetSelector};

/// Identity of a record: `(section, canonical name)`, or just the name for flat tables
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub section: Option<String>,
    pub name: String,
}

impl RecordKey {
    pub fn sectioned(section: impl Into<String>, name: impl Into<String>) -> Self {
        RecordKey {
            section: Some(section.into()),
            name: name.into(),
        }
    }

    pub fn flat(name: impl Into<String>) -> Self {
        RecordKey {
            section: None,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.section {
            Some(section) => write!(f, "({}, {})", section, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableShape {
    /// Keyed by (section, name)
    Sectioned,
    /// Keyed by name alone
    Flat,
}

/// Metric values of one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: BTreeMap<String, f64>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }
}

/// Extracted records of one sheet, with metric columns in sheet order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    pub shape: TableShape,
    pub columns: Vec<String>,
    pub records: BTreeMap<RecordKey, Record>,
}

impl RecordTable {
    pub fn new(shape: TableShape, columns: Vec<String>) -> Self {
        RecordTable {
            shape,
            columns,
            records: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record; a repeated key overwrites the earlier one
    pub fn insert(&mut self, key: RecordKey, record: Record) {
        self.records.insert(key, record);
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn value(&self, key: &RecordKey, column: &str) -> Option<f64> {
        self.records.get(key).and_then(|r| r.get(column))
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.records.keys()
    }
}

/// Physical addresses of logical keys and metric columns in one sheet (0-based)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateIndex {
    pub rows: BTreeMap<RecordKey, usize>,
    pub columns: BTreeMap<String, usize>,
}

impl CoordinateIndex {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Column labels in sheet order
    pub fn column_labels(&self) -> Vec<&str> {
        let mut labels: Vec<(&str, usize)> = self.columns.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        labels.sort_by_key(|(_, col)| *col);
        labels.into_iter().map(|(k, _)| k).collect()
    }

    /// Row keys in sheet order
    pub fn keys_in_sheet_order(&self) -> Vec<(&RecordKey, usize)> {
        let mut keys: Vec<(&RecordKey, usize)> = self.rows.iter().map(|(k, v)| (k, *v)).collect();
        keys.sort_by_key(|(_, row)| *row);
        keys
    }
}

/// Result of extracting one sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub table: RecordTable,
    pub index: CoordinateIndex,
    pub used_fallback: bool,
}

impl Extraction {
    fn empty(shape: TableShape) -> Self {
        Extraction {
            table: RecordTable::new(shape, Vec::new()),
            index: CoordinateIndex::default(),
            used_fallback: false,
        }
    }
}

/// Metric columns: header cells other than the key column with a label
fn metric_columns(headers: &[String], key_col: usize, right_only: bool) -> Vec<(usize, String)> {
    headers
        .iter()
        .enumerate()
        .filter(|(col, label)| {
            let placed = if right_only { *col > key_col } else { *col != key_col };
            placed && !label.is_empty()
        })
        .map(|(col, label)| (col, label.clone()))
        .collect()
}

/// Build the table and coordinate index from accepted `(row, key)` pairs
fn assemble(
    grid: &Grid,
    shape: TableShape,
    metrics: &[(usize, String)],
    rows: impl IntoIterator<Item = (usize, RecordKey)>,
) -> Extraction {
    let mut columns: Vec<String> = Vec::new();
    let mut index = CoordinateIndex::default();
    for (col, label) in metrics {
        if !columns.contains(label) {
            columns.push(label.clone());
        }
        index.columns.insert(label.clone(), *col);
    }

    let mut table = RecordTable::new(shape, columns);
    for (row, key) in rows {
        let mut record = Record::default();
        for (col, label) in metrics {
            let value = grid.get(row, *col).as_number().unwrap_or(0.0);
            record.values.insert(label.clone(), value);
        }
        index.rows.insert(key.clone(), row);
        table.insert(key, record);
    }

    Extraction {
        table,
        index,
        used_fallback: false,
    }
}

/// Attributed, non-excluded data rows with their canonical keys
fn attributed_rows<'a>(
    classified: &'a [ClassifiedRow],
    config: &'a EngineConfig,
) -> impl Iterator<Item = (usize, RecordKey)> + 'a {
    classified.iter().filter_map(move |r| match &r.class {
        RowClass::Data { section: Some(section) } => match normalize_name(&r.label, &config.aliases) {
            Normalized::Canonical(name) => Some((r.row, RecordKey::sectioned(section.clone(), name))),
            Normalized::Excluded | Normalized::Blank => None,
        },
        _ => None,
    })
}

fn primary_pass(grid: &Grid, pos: HeaderPosition, config: &EngineConfig) -> Extraction {
    let headers = header_labels(grid, pos.header_row);
    let metrics = metric_columns(&headers, pos.key_col, true);
    let classified = classify_rows(grid, pos, &config.classifier);
    assemble(grid, TableShape::Sectioned, &metrics, attributed_rows(&classified, config))
}

fn fallback_pass(grid: &Grid, config: &EngineConfig) -> Extraction {
    let headers = header_labels(grid, 0);
    let metrics = metric_columns(&headers, 0, true);
    let classified = classify_fallback_rows(grid, &config.classifier);
    let mut extraction = assemble(grid, TableShape::Sectioned, &metrics, attributed_rows(&classified, config));
    extraction.used_fallback = true;
    extraction
}

/// Extract a sectioned table. Falls back to a row-0/column-0 layout only when
/// the located layout yields no records. A sheet with nothing extractable
/// gives an empty table.
pub fn extract_sections(grid: &Grid, config: &EngineConfig) -> Extraction {
    if grid.row_count() < 2 {
        return Extraction::empty(TableShape::Sectioned);
    }

    let primary = match locate_header(grid, &config.locator) {
        Ok(pos) => primary_pass(grid, pos, config),
        Err(e) => {
            warn!(sheet = %grid.sheet, error = %e, "no header located");
            Extraction::empty(TableShape::Sectioned)
        }
    };

    if !primary.table.is_empty() {
        info!(sheet = %grid.sheet, records = primary.table.len(), "extracted sectioned table");
        return primary;
    }

    if grid.col_count() < 2 {
        return primary;
    }

    let fallback = fallback_pass(grid, config);
    warn!(
        sheet = %grid.sheet,
        records = fallback.table.len(),
        "primary extraction found no records; used fallback layout"
    );
    fallback
}

/// Extract a flat, name-keyed table such as a report's overview sheet
pub fn extract_flat(grid: &Grid, config: &EngineConfig) -> Extraction {
    let pos = match locate_header(grid, &config.flat_locator) {
        Ok(pos) => pos,
        Err(e) => {
            warn!(sheet = %grid.sheet, error = %e, "no header located");
            return Extraction::empty(TableShape::Flat);
        }
    };

    let headers = header_labels(grid, pos.header_row);
    let metrics = metric_columns(&headers, pos.key_col, false);

    let rows = (pos.header_row + 1..grid.row_count()).filter_map(|row| {
        let label = grid.get(row, pos.key_col).as_text();
        if label.is_empty() || config.flat_skip_markers.iter().any(|m| label.contains(m.as_str())) {
            return None;
        }
        normalize_name(&label, &config.aliases)
            .into_name()
            .map(|name| (row, RecordKey::flat(name)))
    });

    let extraction = assemble(grid, TableShape::Flat, &metrics, rows);
    info!(sheet = %grid.sheet, records = extraction.table.len(), "extracted flat table");
    extraction
}

/// Extract a table of the given shape from a grid
pub fn extract(grid: &Grid, shape: TableShape, config: &EngineConfig) -> Extraction {
    match shape {
        TableShape::Sectioned => extract_sections(grid, config),
        TableShape::Flat => extract_flat(grid, config),
    }
}

/// Load a sheet and extract a table of the given shape from it
pub fn extract_sheet(
    path: impl AsRef<Path>,
    sheet: &SheetSelector,
    shape: TableShape,
    config: &EngineConfig,
) -> Result<Extraction, ExcelError> {
    let grid = load_grid(path, sheet)?;
    Ok(extract(&grid, shape, config))
}

/// Structural scan of a sheet for write-back
pub fn build_coordinate_index(
    grid: &Grid,
    shape: TableShape,
    config: &EngineConfig,
) -> Result<CoordinateIndex, ExcelError> {
    let index = extract(grid, shape, config).index;
    if index.is_empty() {
        return Err(ExcelError::structure(format!(
            "Could not find a keyed layout in sheet '{}' (header row with data rows)",
            grid.sheet
        )));
    }
    Ok(index)
}
