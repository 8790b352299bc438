//! Extract, reconcile and write back sectioned questionnaire spreadsheets.
//!
//! A details sheet is read into a physical [`excel::Grid`], its header and
//! sections are located, and each data row becomes a record keyed by
//! `(section, canonical name)`. Two periods can be compared metric by metric,
//! and a table can be written back into any file sharing the layout.

pub mod config;
pub mod excel;
pub mod form;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use excel::{ExcelError, ExcelErrorType, Grid, SheetSelector};
pub use form::{
    compare_tables, copy_forward, extract_sheet, write_back, Comparison, MatchStrategy, RecordKey,
    RecordTable, TableShape, WriteReport,
};
