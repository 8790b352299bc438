use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::excel::ExcelError;
use crate::form::classify::ClassifierConfig;
use crate::form::extract::TableShape;
use crate::form::locate::LocatorConfig;
use crate::form::normalize::AliasRule;
use crate::form::reconcile::{ColumnPair, PairingConfig, RelabelConfig};

/// Engine configuration; defaults describe the growth-hormone questionnaire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered alias table; the first matching rule wins
    pub aliases: Vec<AliasRule>,
    pub locator: LocatorConfig,
    pub flat_locator: LocatorConfig,
    pub classifier: ClassifierConfig,
    /// Case-sensitive substrings dropping a row from flat tables
    pub flat_skip_markers: Vec<String>,
    /// Column pairing for sectioned details tables
    pub pairing: PairingConfig,
    /// Column pairing for flat overview tables
    pub flat_pairing: PairingConfig,
    pub relabel: RelabelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            aliases: default_aliases(),
            locator: LocatorConfig::default(),
            flat_locator: LocatorConfig {
                keywords: vec!["drug".to_string()],
                max_rows: 5,
                max_cols: 64,
                max_label_len: 50,
            },
            classifier: ClassifierConfig::default(),
            flat_skip_markers: vec!["Total".to_string(), "UNIQUE".to_string()],
            pairing: default_pairing(),
            flat_pairing: default_flat_pairing(),
            relabel: default_relabel(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ExcelError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| ExcelError::invalid_config(format!("Invalid engine configuration: {}", e)))?;
        config.relabel.compile()?;
        Ok(config)
    }

    /// Pairing rules for comparing two tables of `shape`
    pub fn pairing_for(&self, shape: TableShape) -> &PairingConfig {
        match shape {
            TableShape::Sectioned => &self.pairing,
            TableShape::Flat => &self.flat_pairing,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ExcelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ExcelError::file_not_found(&path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| ExcelError::read_error(format!("Failed to read configuration: {}", e)))?;
        Self::from_json_str(&json)
    }
}

/// Drug name variants seen across questionnaire files
pub fn default_aliases() -> Vec<AliasRule> {
    vec![
        AliasRule::canonical("Other. (somatrogon (NGENLA) 60mg/1.2mL PFP 1's)", "Ngenla (Pfizer)"),
        AliasRule::canonical("Other. (somatrogon (NGENLA)", "Ngenla (Pfizer)"),
        AliasRule::exclude("Other, please specify"),
        AliasRule::canonical("Other", "Ngenla (Pfizer)"),
    ]
}

// Old details sheets report 12-month windows, new ones 6-month windows
const PERIOD_COLUMNS: [(&str, &str); 8] = [
    (
        "Total patients treated in the last 12 months",
        "Total patients treated in the last 6 months",
    ),
    (
        "Newly diagnosed patients received drug treatments in the last 12 months",
        "Newly diagnosed patients received drug treatments in the last 6 months",
    ),
    (
        "Follow up patients and received drug treatments in the last 12 months",
        "Follow up patients and received drug treatments in the last 6 months",
    ),
    (
        "All newly diagnosed in the last 12 months",
        "All newly diagnosed in the last 6 months",
    ),
    (
        "Newly diagnosed patients but didn't receive drug treatments in the last 12 months",
        "Newly diagnosed patients but didn't receive drug treatments in the last 6 months",
    ),
    ("All follow up patients (12 mo)", "All follow up patients"),
    (
        "Follow up patients and didn't receive drug treatments in the last 12 months",
        "Follow up patients and didn't receive drug treatments in the last 6 months",
    ),
    (
        "Active patients on treatments (Received treatments in April - June 2025)",
        "Active patients (Received treatments in October - December 2025)",
    ),
];

fn default_pairing() -> PairingConfig {
    PairingConfig {
        explicit: PERIOD_COLUMNS[..3]
            .iter()
            .map(|(old, new)| ColumnPair::new(old, new))
            .collect(),
        keyword: Vec::new(),
        positional_limit: 4,
        label_max_len: 35,
        label_abbreviations: vec![
            ("12 months".to_string(), "12mo".to_string()),
            ("6 months".to_string(), "6mo".to_string()),
        ],
    }
}

// Overview sheets name their metric columns loosely across periods
fn default_flat_pairing() -> PairingConfig {
    PairingConfig {
        explicit: Vec::new(),
        keyword: vec![
            ColumnPair::labelled("Total", "Total", "Total"),
            ColumnPair::new("Newly diagnosed patients received", "Newly diagnosed"),
            ColumnPair::new("Follow up patients and received", "Follow up received"),
            ColumnPair::new("Active patients", "Active patients"),
        ],
        positional_limit: 4,
        label_max_len: 40,
        label_abbreviations: Vec::new(),
    }
}

fn default_relabel() -> RelabelConfig {
    RelabelConfig {
        renames: PERIOD_COLUMNS
            .iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect(),
        substitutions: vec![("12 months".to_string(), "6 months".to_string())],
    }
}
