//! Questionnaire-form pipeline: locate the header, classify rows into
//! sections, extract keyed records, compare periods and write values back.

pub mod normalize;
pub mod locate;
pub mod classify;
pub mod extract;
pub mod reconcile;
pub mod patch;

pub use classify::{classify_rows, ClassifierConfig, RowClass};
pub use extract::{
    build_coordinate_index, extract, extract_flat, extract_sections, extract_sheet, CoordinateIndex,
    Extraction, Record, RecordKey, RecordTable, TableShape,
};
pub use locate::{locate_header, HeaderPosition, LocatorConfig};
pub use normalize::{normalize_name, AliasRule, AliasTarget, Matcher, Normalized};
pub use patch::{copy_forward, plan_writes, write_back, MatchStrategy, WriteReport};
pub use reconcile::{
    compare_tables, pair_columns, relabel_columns, ColumnPair, Comparison, ComparisonRow, MetricPair,
    PairingConfig, RelabelConfig,
};
