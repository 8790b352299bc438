//! Excel module for reading sheets into grids and writing values back.
//!
//! This module provides:
//! - Loading a sheet into a physical cell grid (from disk or memory)
//! - Sheet discovery and checksums
//! - Atomic in-place saves of edited workbooks

pub mod types;
pub mod reader;
pub mod writer;

// Re-export commonly used types and functions
pub use types::*;
pub use reader::{
    compute_checksum, details_sheet_pair, find_details_sheet, get_sheets, load_grid,
    load_grid_from_bytes, second_sheet_pair, sheet_names,
};
pub use writer::{open_workbook, save_atomic, set_number, stage_workbook, StagedWrite};
