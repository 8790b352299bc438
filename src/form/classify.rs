//! Section-aware row classification.
//!
//! Business forms mix category banners, rollup rows and per-entity rows in a
//! single column. Each row under the header is classified from its content
//! while the active section is threaded through a fold.

use serde::{Deserialize, Serialize};

use super::locate::HeaderPosition;
use crate::excel::Grid;

/// Content heuristics driving the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lowercase labels that are never data or sections
    pub skip_labels: Vec<String>,
    /// Lowercase substrings marking metadata rows
    pub skip_substrings: Vec<String>,
    /// Lowercase substrings of "total/unique" rollup rows
    pub rollup_markers: Vec<String>,
    /// Generic placeholder entry of the form
    pub placeholder_label: String,
    /// A label is a section header when it contains every substring of any group
    pub section_markers: Vec<Vec<String>>,
    /// Cells right of the key column searched for a number
    pub numeric_scan_width: usize,
    /// Section label used by the fallback pass before any implicit section
    pub fallback_section: String,
    /// Lowercase substrings keeping a non-numeric fallback row from opening a section
    pub fallback_rollup_markers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            skip_labels: strings(&["scope", "time period", "type", "drug", "questionnaire"]),
            skip_substrings: strings(&["time period", "scope"]),
            rollup_markers: strings(&["total patients", "unique"]),
            placeholder_label: "Other, please specify".to_string(),
            section_markers: vec![
                strings(&["growth hormone", "def"]),
                strings(&["growth hormone", "ghd"]),
                strings(&["gestational"]),
                strings(&["sga"]),
                strings(&["syndrome", "turner"]),
            ],
            numeric_scan_width: 5,
            fallback_section: "Details".to_string(),
            fallback_rollup_markers: strings(&["patients"]),
        }
    }
}

impl ClassifierConfig {
    fn is_skip_label(&self, lower: &str) -> bool {
        self.skip_labels.iter().any(|s| s == lower)
            || self.skip_substrings.iter().any(|s| lower.contains(s.as_str()))
    }

    fn is_rollup(&self, lower: &str) -> bool {
        self.rollup_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Section banner: matches a marker group and is not a rollup row
    pub fn is_section_header(&self, label: &str) -> bool {
        let lower = label.trim().to_lowercase();
        if lower.is_empty() || self.is_rollup(&lower) {
            return false;
        }
        self.section_markers
            .iter()
            .any(|group| !group.is_empty() && group.iter().all(|m| lower.contains(m.as_str())))
    }
}

/// The active section while walking rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionState {
    NoSection,
    InSection(String),
}

impl SectionState {
    pub fn section(&self) -> Option<&str> {
        match self {
            SectionState::NoSection => None,
            SectionState::InSection(label) => Some(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowClass {
    Skip,
    SectionHeader(String),
    /// `section` is `None` for rows seen before any section; those cannot be attributed
    Data { section: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub row: usize,
    pub label: String,
    pub class: RowClass,
}

/// True when the row carries a number right of the key column
pub fn row_has_numeric(grid: &Grid, row: usize, key_col: usize, scan_width: usize) -> bool {
    let first = key_col + 1;
    if grid.get(row, first).as_number().is_some() {
        return true;
    }
    let end = (first + scan_width).min(grid.col_count());
    (first..end).any(|col| grid.get(row, col).as_number().is_some())
}

/// Classify one labelled row, returning the state for the next row
pub fn classify_row(
    state: SectionState,
    label: &str,
    has_numeric: bool,
    config: &ClassifierConfig,
) -> (SectionState, RowClass) {
    let lower = label.to_lowercase();
    if label.is_empty() || config.is_skip_label(&lower) {
        return (state, RowClass::Skip);
    }

    if has_numeric {
        let section = state.section().map(str::to_string);
        return (state, RowClass::Data { section });
    }

    // Unfilled forms leave every metric blank; entity rows still count as data
    if let SectionState::InSection(section) = &state {
        if !config.is_rollup(&lower)
            && label != config.placeholder_label
            && !config.is_section_header(label)
        {
            let section = Some(section.clone());
            return (state, RowClass::Data { section });
        }
    }

    if config.is_section_header(label) {
        return (
            SectionState::InSection(label.to_string()),
            RowClass::SectionHeader(label.to_string()),
        );
    }

    (state, RowClass::Skip)
}

/// Classify every labelled row below the header
pub fn classify_rows(grid: &Grid, pos: HeaderPosition, config: &ClassifierConfig) -> Vec<ClassifiedRow> {
    let (_, rows) = labelled_rows(grid, pos.header_row + 1, pos.key_col).fold(
        (SectionState::NoSection, Vec::new()),
        |(state, mut out), (row, label)| {
            let has_numeric = row_has_numeric(grid, row, pos.key_col, config.numeric_scan_width);
            let (next, class) = classify_row(state, &label, has_numeric, config);
            out.push(ClassifiedRow { row, label, class });
            (next, out)
        },
    );
    rows
}

/// Classify rows of a sheet with no recognizable header: header at row 0, key
/// at column 0, and every unrecognized non-numeric row opening an implicit section.
pub fn classify_fallback_rows(grid: &Grid, config: &ClassifierConfig) -> Vec<ClassifiedRow> {
    let start = SectionState::InSection(config.fallback_section.clone());
    let (_, rows) = labelled_rows(grid, 1, 0).fold((start, Vec::new()), |(state, mut out), (row, label)| {
        let lower = label.to_lowercase();
        let (next, class) = if config.skip_labels.iter().any(|s| *s == lower) {
            (state, RowClass::Skip)
        } else if row_has_numeric(grid, row, 0, config.numeric_scan_width) {
            let section = state.section().map(str::to_string);
            (state, RowClass::Data { section })
        } else if grid.get(row, 0).as_number().is_none()
            && !lower.starts_with("total")
            && !config.fallback_rollup_markers.iter().any(|m| lower.contains(m.as_str()))
        {
            (
                SectionState::InSection(label.clone()),
                RowClass::SectionHeader(label.clone()),
            )
        } else {
            (state, RowClass::Skip)
        };
        out.push(ClassifiedRow { row, label, class });
        (next, out)
    });
    rows
}

/// Rows from `start` whose key cell is non-empty, with its trimmed text
fn labelled_rows(grid: &Grid, start: usize, key_col: usize) -> impl Iterator<Item = (usize, String)> + '_ {
    (start..grid.row_count()).filter_map(move |row| {
        let label = grid.get(row, key_col).as_text();
        (!label.is_empty()).then_some((row, label))
    })
}
