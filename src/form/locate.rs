use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::excel::{ExcelError, Grid};

/// Bounds and keywords for the header scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Lowercase keywords; a header cell contains one of them
    pub keywords: Vec<String>,
    pub max_rows: usize,
    pub max_cols: usize,
    /// Cells at least this long are prose, not headers
    pub max_label_len: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            keywords: ["type", "drug", "product", "treatment"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_rows: 25,
            max_cols: 10,
            max_label_len: 50,
        }
    }
}

/// Physical position of a located table's header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPosition {
    pub header_row: usize,
    pub key_col: usize,
}

/// Find the first cell, row-major within the scan window, that looks like the
/// key column's header.
pub fn locate_header(grid: &Grid, config: &LocatorConfig) -> Result<HeaderPosition, ExcelError> {
    let rows = grid.row_count().min(config.max_rows);
    let cols = grid.col_count().min(config.max_cols);

    for row in 0..rows {
        for col in 0..cols {
            let cell = grid.get(row, col).as_text().to_lowercase();
            if cell.is_empty() || cell.chars().count() >= config.max_label_len {
                continue;
            }
            if config.keywords.iter().any(|kw| cell.contains(kw.as_str())) {
                debug!(sheet = %grid.sheet, row, col, header = %cell, "located header");
                return Ok(HeaderPosition {
                    header_row: row,
                    key_col: col,
                });
            }
        }
    }

    Err(ExcelError::structure(format!(
        "No header found in sheet '{}' within the first {} rows and {} columns",
        grid.sheet, config.max_rows, config.max_cols
    )))
}

/// Header labels of the header row, trimmed; blank headers are empty strings
pub fn header_labels(grid: &Grid, header_row: usize) -> Vec<String> {
    grid.row(header_row).iter().map(|c| c.as_text()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::ExcelErrorType;
    use crate::test_support::row;

    #[test]
    fn test_locates_offset_header() {
        let grid = Grid::new(
            "Sheet1",
            vec![
                row(&["American Hospital questionnaire"]),
                row(&[""]),
                row(&["", "", "Drug / Type", "Metric"]),
            ],
        );
        let pos = locate_header(&grid, &LocatorConfig::default()).unwrap();
        assert_eq!(pos, HeaderPosition { header_row: 2, key_col: 2 });
    }

    #[test]
    fn test_skips_long_prose_cells() {
        let grid = Grid::new(
            "Sheet1",
            vec![
                row(&["Please list every drug type you prescribe to patients in the clinic"]),
                row(&["Product", "Units"]),
            ],
        );
        let pos = locate_header(&grid, &LocatorConfig::default()).unwrap();
        assert_eq!(pos.header_row, 1);
        assert_eq!(pos.key_col, 0);
    }

    #[test]
    fn test_window_bounds_the_scan() {
        let mut rows = vec![row(&["x"]); 30];
        rows.push(row(&["Type", "Metric"]));
        let grid = Grid::new("Sheet1", rows);
        let err = locate_header(&grid, &LocatorConfig::default()).unwrap_err();
        assert_eq!(err.error_type, ExcelErrorType::Structure);

        let wide = LocatorConfig {
            max_rows: 40,
            ..LocatorConfig::default()
        };
        assert_eq!(locate_header(&grid, &wide).unwrap().header_row, 30);
    }
}
