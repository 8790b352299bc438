use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::extract::{Record, RecordKey, RecordTable, TableShape};
use crate::excel::ExcelError;

/// A known correspondence between an old-period and a new-period column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub old: String,
    pub new: String,
    /// Display label of the metric; derived from the old column when absent
    #[serde(default)]
    pub label: Option<String>,
}

impl ColumnPair {
    pub fn new(old: &str, new: &str) -> Self {
        ColumnPair {
            old: old.to_string(),
            new: new.to_string(),
            label: None,
        }
    }

    pub fn labelled(old: &str, new: &str, label: &str) -> Self {
        ColumnPair {
            old: old.to_string(),
            new: new.to_string(),
            label: Some(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Exact old → new label pairs
    pub explicit: Vec<ColumnPair>,
    /// Substring pairs tried when no explicit pair applies
    pub keyword: Vec<ColumnPair>,
    pub positional_limit: usize,
    pub label_max_len: usize,
    /// Replacements applied to derived metric labels
    pub label_abbreviations: Vec<(String, String)>,
}

impl Default for PairingConfig {
    fn default() -> Self {
        PairingConfig {
            explicit: Vec::new(),
            keyword: Vec::new(),
            positional_limit: 4,
            label_max_len: 35,
            label_abbreviations: Vec::new(),
        }
    }
}

impl PairingConfig {
    fn metric_label(&self, pair_label: Option<&str>, old_column: &str) -> String {
        if let Some(label) = pair_label {
            return label.to_string();
        }
        let truncated: String = old_column.chars().take(self.label_max_len).collect();
        self.label_abbreviations
            .iter()
            .fold(truncated, |label, (from, to)| label.replace(from.as_str(), to))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingMethod {
    Explicit,
    Keyword,
    Positional,
}

/// An old column and a new column compared as one metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPair {
    pub metric: String,
    pub old_column: String,
    pub new_column: String,
    pub method: PairingMethod,
}

/// Pair metric columns: explicit pairs, else keyword pairs, else the first
/// columns of each table by position.
pub fn pair_columns(old: &RecordTable, new: &RecordTable, config: &PairingConfig) -> Vec<MetricPair> {
    let explicit: Vec<MetricPair> = config
        .explicit
        .iter()
        .filter(|p| old.columns.contains(&p.old) && new.columns.contains(&p.new))
        .map(|p| MetricPair {
            metric: config.metric_label(p.label.as_deref(), &p.old),
            old_column: p.old.clone(),
            new_column: p.new.clone(),
            method: PairingMethod::Explicit,
        })
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }

    let keyword: Vec<MetricPair> = config
        .keyword
        .iter()
        .filter_map(|p| {
            let old_column = old.columns.iter().find(|c| c.contains(p.old.as_str()))?;
            let new_column = new
                .columns
                .iter()
                .find(|c| c.contains(p.new.as_str()) || c.contains(p.old.as_str()))?;
            Some(MetricPair {
                metric: config.metric_label(p.label.as_deref(), old_column),
                old_column: old_column.clone(),
                new_column: new_column.clone(),
                method: PairingMethod::Keyword,
            })
        })
        .collect();
    if !keyword.is_empty() {
        return keyword;
    }

    old.columns
        .iter()
        .zip(new.columns.iter())
        .take(config.positional_limit)
        .map(|(o, n)| MetricPair {
            metric: config.metric_label(None, o),
            old_column: o.clone(),
            new_column: n.clone(),
            method: PairingMethod::Positional,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub old: f64,
    pub new: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub key: RecordKey,
    pub deltas: Vec<MetricDelta>,
}

impl ComparisonRow {
    /// Flattened `{metric}_old`, `{metric}_new`, `{metric}_change` fields
    pub fn fields(&self) -> Vec<(String, f64)> {
        self.deltas
            .iter()
            .flat_map(|d| {
                [
                    (format!("{}_old", d.metric), d.old),
                    (format!("{}_new", d.metric), d.new),
                    (format!("{}_change", d.metric), d.change),
                ]
            })
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields().into_iter().find(|(f, _)| f == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub shape: TableShape,
    pub metrics: Vec<MetricPair>,
    pub rows: Vec<ComparisonRow>,
}

impl Comparison {
    pub fn row(&self, key: &RecordKey) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| &r.key == key)
    }
}

fn side_value(table: &RecordTable, key: &RecordKey, column: &str) -> f64 {
    table
        .value(key, column)
        .filter(|v| !v.is_nan())
        .unwrap_or(0.0)
}

/// Compare two periods of the same report over the union of their keys.
///
/// A key or column missing on one side reads as 0.0 there.
pub fn compare_tables(old: &RecordTable, new: &RecordTable, config: &PairingConfig) -> Comparison {
    let metrics = pair_columns(old, new, config);
    debug!(pairs = metrics.len(), "paired metric columns");

    let keys: BTreeSet<&RecordKey> = old.keys().chain(new.keys()).collect();
    let rows = keys
        .into_iter()
        .map(|key| ComparisonRow {
            key: key.clone(),
            deltas: metrics
                .iter()
                .map(|m| {
                    let old_value = side_value(old, key, &m.old_column);
                    let new_value = side_value(new, key, &m.new_column);
                    MetricDelta {
                        metric: m.metric.clone(),
                        old: old_value,
                        new: new_value,
                        change: new_value - old_value,
                    }
                })
                .collect(),
        })
        .collect();

    let shape = if old.is_empty() { new.shape } else { old.shape };
    Comparison { shape, metrics, rows }
}

/// Column renames applied before copying one period's values into another's layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelabelConfig {
    /// Exact old → new column names
    pub renames: Vec<(String, String)>,
    /// Regex pattern → replacement, tried in order when no rename applies
    pub substitutions: Vec<(String, String)>,
}

impl RelabelConfig {
    pub fn compile(&self) -> Result<Vec<(Regex, String)>, ExcelError> {
        self.substitutions
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.clone()))
                    .map_err(|e| ExcelError::invalid_config(format!("Invalid relabel pattern '{}': {}", pattern, e)))
            })
            .collect()
    }
}

/// Return a copy of `table` with its metric columns renamed
pub fn relabel_columns(table: &RecordTable, config: &RelabelConfig) -> Result<RecordTable, ExcelError> {
    let substitutions = config.compile()?;
    let rename = |column: &str| -> String {
        if let Some((_, new)) = config.renames.iter().find(|(old, _)| old == column) {
            return new.clone();
        }
        substitutions
            .iter()
            .find(|(re, _)| re.is_match(column))
            .map(|(re, replacement)| re.replace_all(column, replacement.as_str()).into_owned())
            .unwrap_or_else(|| column.to_string())
    };

    let mut columns: Vec<String> = Vec::new();
    for column in &table.columns {
        let renamed = rename(column);
        if !columns.contains(&renamed) {
            columns.push(renamed);
        }
    }

    let mut out = RecordTable::new(table.shape, columns);
    for (key, record) in &table.records {
        let values = record.values.iter().map(|(c, v)| (rename(c), *v)).collect();
        out.insert(key.clone(), Record { values });
    }
    Ok(out)
}
