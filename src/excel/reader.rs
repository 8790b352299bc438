use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

use super::types::*;

/// Sheet name the questionnaire's per-indication tab usually carries
const DETAILS_SHEET_NAME: &str = "questionnaire - details";

/// Read one sheet of a workbook on disk into a grid
pub fn load_grid(path: impl AsRef<Path>, sheet: &SheetSelector) -> Result<Grid, ExcelError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    if !path.exists() {
        return Err(ExcelError::file_not_found(&display));
    }

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| ExcelError::read_error(format!("Failed to open workbook '{}': {}", display, e)))?;

    read_sheet_grid(&mut workbook, sheet)
}

/// Read one sheet of an in-memory workbook into a grid
pub fn load_grid_from_bytes(bytes: &[u8], sheet: &SheetSelector) -> Result<Grid, ExcelError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExcelError::read_error(format!("Failed to open workbook: {}", e)))?;

    read_sheet_grid(&mut workbook, sheet)
}

fn read_sheet_grid<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    sheet: &SheetSelector,
) -> Result<Grid, ExcelError> {
    let sheet_names = workbook.sheet_names().to_vec();
    let target_sheet = sheet
        .resolve(&sheet_names)
        .ok_or_else(|| ExcelError::sheet_not_found(&sheet.to_string()))?
        .to_string();

    let range = workbook
        .worksheet_range(&target_sheet)
        .map_err(|e| ExcelError::read_error(format!("Failed to read sheet '{}': {}", target_sheet, e)))?;

    let grid = range_to_grid(&target_sheet, &range);
    debug!(
        sheet = %target_sheet,
        rows = grid.row_count(),
        cols = grid.col_count(),
        "loaded sheet grid"
    );
    Ok(grid)
}

/// Place a calamine range into a grid anchored at A1
fn range_to_grid(sheet: &str, range: &Range<Data>) -> Grid {
    let (start, end) = match (range.start(), range.end()) {
        (Some(start), Some(end)) => (start, end),
        _ => return Grid::new(sheet, Vec::new()),
    };

    let height = end.0 as usize + 1;
    let width = end.1 as usize + 1;
    let mut rows = vec![vec![CellValue::Empty; width]; height];

    for (row_idx, col_idx, data) in range.cells() {
        let row = row_idx + start.0 as usize;
        let col = col_idx + start.1 as usize;
        rows[row][col] = convert_cell_value(data);
    }

    Grid::new(sheet, rows)
}

/// Convert calamine Data to our CellValue
fn convert_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => date_cell(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::DateTime(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
    }
}

/// Date-formatted cell; serials outside the calendar range stay numeric
fn date_cell(value: f64) -> CellValue {
    match format_excel_datetime(value) {
        Some(dt) => CellValue::DateTime(dt),
        None => CellValue::Number(value),
    }
}

/// Format Excel datetime (days since 1899-12-30) to ISO 8601
fn format_excel_datetime(value: f64) -> Option<String> {
    let days = value.floor() as i64;
    let total_seconds = (value.fract() * 86400.0).round() as u32;

    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(chrono::TimeDelta::try_days(days)?)?;
    let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(total_seconds.min(86399), 0)?;

    Some(
        chrono::NaiveDateTime::new(date, time)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    )
}

/// Get the sheet names of a workbook, in workbook order
pub fn sheet_names(path: impl AsRef<Path>) -> Result<Vec<String>, ExcelError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExcelError::file_not_found(&path.display().to_string()));
    }

    let workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| ExcelError::read_error(format!("Failed to open workbook: {}", e)))?;

    Ok(workbook.sheet_names().to_vec())
}

/// Get list of sheets in a workbook with their used sizes
pub fn get_sheets(path: impl AsRef<Path>) -> Result<Vec<SheetInfo>, ExcelError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExcelError::file_not_found(&path.display().to_string()));
    }

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| ExcelError::read_error(format!("Failed to open workbook: {}", e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for (index, name) in sheet_names.iter().enumerate() {
        let (row_count, col_count) = workbook
            .worksheet_range(name)
            .map(|range| range.end().map(|(r, c)| (r + 1, c + 1)).unwrap_or((0, 0)))
            .unwrap_or((0, 0));

        sheets.push(SheetInfo {
            name: name.clone(),
            index: index as u32,
            row_count,
            col_count,
        });
    }

    Ok(sheets)
}

/// SHA-256 of a file's bytes, hex encoded
pub fn compute_checksum(path: impl AsRef<Path>) -> Result<String, ExcelError> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .map_err(|e| ExcelError::read_error(format!("Failed to open '{}' for checksum: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| ExcelError::read_error(format!("Failed to hash '{}': {}", path.display(), e)))?;

    Ok(format!("{:x}", hasher.finalize()))
}

fn normalize_sheet_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Detect the details sheet among a workbook's sheet names.
///
/// Preference: "Questionnaire - details" (any case), then any name containing
/// "details", then the second sheet.
pub fn find_details_sheet(names: &[String]) -> Option<&str> {
    names
        .iter()
        .find(|n| normalize_sheet_name(n) == DETAILS_SHEET_NAME)
        .or_else(|| names.iter().find(|n| normalize_sheet_name(n).contains("details")))
        .or_else(|| names.get(1))
        .map(|n| n.as_str())
}

/// Resolve the details sheet name to use in each of two workbooks.
///
/// Each returned name is spelled as it appears in its own workbook.
pub fn details_sheet_pair(old_names: &[String], new_names: &[String]) -> Option<(String, String)> {
    let old = find_details_sheet(old_names);
    let new = find_details_sheet(new_names);

    if let (Some(o), Some(n)) = (old, new) {
        if normalize_sheet_name(o) == normalize_sheet_name(n) {
            return Some((o.to_string(), n.to_string()));
        }
    }

    if let Some(o) = old {
        let norm = normalize_sheet_name(o);
        if let Some(n) = new_names.iter().find(|n| normalize_sheet_name(n) == norm) {
            return Some((o.to_string(), n.clone()));
        }
    }

    if let Some(n) = new {
        let norm = normalize_sheet_name(n);
        if let Some(o) = old_names.iter().find(|o| normalize_sheet_name(o) == norm) {
            return Some((o.clone(), n.to_string()));
        }
    }

    None
}

/// Second tab of each workbook, when both have one
pub fn second_sheet_pair(old_names: &[String], new_names: &[String]) -> (Option<String>, Option<String>) {
    (old_names.get(1).cloned(), new_names.get(1).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_fixture, FixtureCell};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_details_sheet_preference() {
        assert_eq!(
            find_details_sheet(&names(&["Overview", "Notes", "QUESTIONNAIRE - Details"])),
            Some("QUESTIONNAIRE - Details")
        );
        assert_eq!(
            find_details_sheet(&names(&["Overview", "Notes", "Patient details"])),
            Some("Patient details")
        );
        assert_eq!(find_details_sheet(&names(&["Overview", "Notes"])), Some("Notes"));
        assert_eq!(find_details_sheet(&names(&["Overview"])), None);
    }

    #[test]
    fn test_details_sheet_pair_tolerates_case() {
        let pair = details_sheet_pair(
            &names(&["Overview", "Questionnaire - details"]),
            &names(&["Overview", "questionnaire - Details"]),
        );
        assert_eq!(
            pair,
            Some((
                "Questionnaire - details".to_string(),
                "questionnaire - Details".to_string()
            ))
        );
    }

    #[test]
    fn test_details_sheet_pair_none_without_common_sheet() {
        let pair = details_sheet_pair(&names(&["Overview", "Alpha"]), &names(&["Overview", "Beta"]));
        assert_eq!(pair, None);
        assert_eq!(
            second_sheet_pair(&names(&["Overview", "Alpha"]), &names(&["Overview"])),
            (Some("Alpha".to_string()), None)
        );
    }

    #[test]
    fn test_format_excel_datetime() {
        assert_eq!(format_excel_datetime(45658.5).as_deref(), Some("2025-01-01T12:00:00"));
    }

    #[test]
    fn test_out_of_range_date_serial_stays_numeric() {
        assert_eq!(format_excel_datetime(1.0e9), None);
        assert_eq!(format_excel_datetime(1.0e300), None);
        assert_eq!(format_excel_datetime(-1.0e12), None);
        assert_eq!(date_cell(1.0e9), CellValue::Number(1.0e9));
        assert_eq!(date_cell(45658.0), CellValue::DateTime("2025-01-01T00:00:00".to_string()));
    }

    #[test]
    fn test_sheet_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.xlsx");
        write_fixture(
            &path,
            &[
                ("Overview", vec![(1, 1, FixtureCell::text("Drug"))]),
                (
                    "Questionnaire - details",
                    vec![(2, 2, FixtureCell::text("Type")), (5, 4, FixtureCell::Number(3.0))],
                ),
            ],
        );

        let names = sheet_names(&path).unwrap();
        assert_eq!(names, vec!["Overview", "Questionnaire - details"]);
        assert_eq!(find_details_sheet(&names), Some("Questionnaire - details"));

        let sheets = get_sheets(&path).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!((sheets[0].index, sheets[0].row_count, sheets[0].col_count), (0, 1, 1));
        assert_eq!(sheets[1].name, "Questionnaire - details");
        assert_eq!((sheets[1].row_count, sheets[1].col_count), (5, 4));

        let err = sheet_names(dir.path().join("absent.xlsx")).unwrap_err();
        assert_eq!(err.error_type, ExcelErrorType::FileNotFound);
    }

    #[test]
    fn test_load_grid_keeps_physical_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.xlsx");
        write_fixture(
            &path,
            &[(
                "Data",
                vec![
                    (3, 2, FixtureCell::text("Drug")),
                    (4, 2, FixtureCell::text("Genotropin (Pfizer)")),
                    (4, 3, FixtureCell::Number(7.0)),
                ],
            )],
        );

        let grid = load_grid(&path, &SheetSelector::from("Data")).unwrap();
        assert_eq!(grid.get(2, 1), &CellValue::String("Drug".to_string()));
        assert_eq!(grid.get(3, 2), &CellValue::Number(7.0));
        assert!(grid.get(0, 0).is_empty());

        let bytes = std::fs::read(&path).unwrap();
        let from_bytes = load_grid_from_bytes(&bytes, &SheetSelector::from(0)).unwrap();
        assert_eq!(from_bytes, grid);
    }

    #[test]
    fn test_load_grid_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xlsx");
        let err = load_grid(&missing, &SheetSelector::from(0)).unwrap_err();
        assert_eq!(err.error_type, ExcelErrorType::FileNotFound);

        let path = dir.path().join("one.xlsx");
        write_fixture(&path, &[("Only", vec![(1, 1, FixtureCell::text("x"))])]);
        let err = load_grid(&path, &SheetSelector::from("Other")).unwrap_err();
        assert_eq!(err.error_type, ExcelErrorType::SheetNotFound);
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            compute_checksum(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
