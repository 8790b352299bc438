//! Workbook fixtures for file-backed tests.

use std::path::Path;
use umya_spreadsheet::{new_file_empty_worksheet, writer};

use crate::excel::{CellValue, Grid};

pub enum FixtureCell {
    Text(String),
    Number(f64),
}

impl FixtureCell {
    pub fn text(s: &str) -> Self {
        FixtureCell::Text(s.to_string())
    }
}

/// Write an xlsx with the given sheets; cells are `(row, col, value)`, 1-based
pub fn write_fixture(path: &Path, sheets: &[(&str, Vec<(u32, u32, FixtureCell)>)]) {
    let mut book = new_file_empty_worksheet();

    for (name, cells) in sheets {
        let sheet = book.new_sheet(*name).unwrap();
        for (row, col, value) in cells {
            let cell = sheet.get_cell_mut((*col, *row));
            match value {
                FixtureCell::Text(s) => {
                    cell.set_value(s.as_str());
                }
                FixtureCell::Number(n) => {
                    cell.set_value_number(*n);
                }
            }
        }
    }

    writer::xlsx::write(&book, path).unwrap();
}

/// Turn a grid into fixture cells so the same layout can be written to disk
pub fn grid_cells(grid: &Grid) -> Vec<(u32, u32, FixtureCell)> {
    let mut cells = Vec::new();
    for row in 0..grid.row_count() {
        for col in 0..grid.col_count() {
            let value = match grid.get(row, col) {
                CellValue::String(s) => FixtureCell::Text(s.clone()),
                CellValue::Number(n) => FixtureCell::Number(*n),
                _ => continue,
            };
            cells.push((row as u32 + 1, col as u32 + 1, value));
        }
    }
    cells
}

fn text(s: &str) -> CellValue {
    CellValue::String(s.to_string())
}

fn num(n: f64) -> CellValue {
    CellValue::Number(n)
}

/// Parse a compact row description: "" is blank, numbers become numbers
pub fn row(cells: &[&str]) -> Vec<CellValue> {
    cells
        .iter()
        .map(|c| {
            if c.is_empty() {
                CellValue::Empty
            } else if let Ok(n) = c.parse::<f64>() {
                num(n)
            } else {
                text(c)
            }
        })
        .collect()
}

/// A details sheet shaped like the growth-hormone questionnaire: title rows,
/// a "Type" header in column B at row 3, three indication sections, rollup rows
/// and one unfilled section.
pub fn details_grid() -> Grid {
    Grid::new(
        "Questionnaire - details",
        vec![
            row(&["", "Questionnaire"]),
            row(&["", "Time period: last 12 months"]),
            row(&[
                "",
                "Type",
                "Total patients treated in the last 12 months",
                "Newly diagnosed patients received drug treatments in the last 12 months",
                "Follow up patients and received drug treatments in the last 12 months",
            ]),
            row(&["", "Pediatric Growth Hormone Deficiency (pGHD)"]),
            row(&["", "Genotropin (Pfizer)", "10", "2", "8"]),
            row(&["", "Norditropin (Novo Nordisk)", "5", "", "5"]),
            row(&["", "Other, please specify", "3", "1", "2"]),
            row(&["", "Other. (somatrogon (NGENLA) 60mg/1.2mL PFP 1's)", "4", "4", "0"]),
            row(&["", "Total patients (UNIQUE)", "", "", ""]),
            row(&[""]),
            row(&["", "Small for Gestational Age (SGA)"]),
            row(&["", "Genotropin (Pfizer)", "6", "1", "5"]),
            row(&["", "Turner Syndrome"]),
            row(&["", "Genotropin (Pfizer)"]),
            row(&["", "Omnitrope (Sandoz)"]),
        ],
    )
}
