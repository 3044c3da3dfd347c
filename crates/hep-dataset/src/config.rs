//! Dataset layout: which tables become tensors, with which columns.
//!
//! A layout is loaded once (YAML or JSON) and validated before any job is
//! planned:
//!
//! ```yaml
//! inputs:
//!   - key: Jet
//!     rows_per_event: 8
//!     columns: [Energy, Px, Py, Pz, PT, Eta, Phi, BTag]
//!   - key: Electron
//!     rows_per_event: 2
//!     columns: [Energy, Px, Py, Pz, PT_or_ET, Eta, Phi, Charge, EleIso]
//! aux:
//!   key: EventChars
//!   columns: [MET, HT, JetMul, MaxJetPT, MaxLepPT]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use hep_core::{Error, ObjectKind, Result, TableKey};

/// Column that identifies events inside a store; never a feature.
pub const RESERVED_COLUMN: &str = "Entry";

/// One per-object tensor input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSpec {
    /// Object table key (`Jet`, `Electron`, ...).
    pub key: String,
    /// Feature columns, in tensor order.
    pub columns: Vec<String>,
    /// Fixed row budget per event; events are truncated or zero-padded to it.
    pub rows_per_event: usize,
}

/// Event-level auxiliary vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuxSpec {
    /// Table key, one row per event.
    #[serde(default = "default_aux_key")]
    pub key: String,
    /// Feature columns.
    pub columns: Vec<String>,
}

fn default_aux_key() -> String {
    TableKey::EventChars.name().to_string()
}

/// Tensor inputs plus the optional auxiliary vector of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetLayout {
    /// Per-object tensor inputs, in shard order.
    pub inputs: Vec<InputSpec>,
    /// Event-level features stored under `HLF`.
    #[serde(default)]
    pub aux: Option<AuxSpec>,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            inputs: vec![
                InputSpec {
                    key: "Jet".into(),
                    columns: strings(&["Energy", "Px", "Py", "Pz", "PT", "Eta", "Phi", "BTag"]),
                    rows_per_event: 8,
                },
                InputSpec {
                    key: "Electron".into(),
                    columns: strings(&[
                        "Energy", "Px", "Py", "Pz", "PT_or_ET", "Eta", "Phi", "Charge", "EleIso",
                    ]),
                    rows_per_event: 2,
                },
                InputSpec {
                    key: "MuonTight".into(),
                    columns: strings(&[
                        "Energy", "Px", "Py", "Pz", "PT_or_ET", "Eta", "Phi", "Charge", "MuIso",
                    ]),
                    rows_per_event: 2,
                },
            ],
            aux: Some(AuxSpec {
                key: default_aux_key(),
                columns: strings(&[
                    "MET", "HT", "MuonMul", "ElectronMul", "JetMul", "MaxJetPT", "MaxLepPT",
                ]),
            }),
        }
    }
}

fn check_columns(key: TableKey, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::Configuration(format!("no columns selected for '{}'", key.name())));
    }
    let known = key.column_names();
    let mut seen = HashSet::new();
    for c in columns {
        if c == RESERVED_COLUMN {
            return Err(Error::Configuration(format!(
                "'{RESERVED_COLUMN}' identifies events and cannot be a feature (table '{}')",
                key.name()
            )));
        }
        if !known.contains(&c.as_str()) {
            return Err(Error::Configuration(format!(
                "table '{}' has no column '{c}'",
                key.name()
            )));
        }
        if !seen.insert(c.as_str()) {
            return Err(Error::Configuration(format!(
                "column '{c}' listed twice for '{}'",
                key.name()
            )));
        }
    }
    Ok(())
}

impl InputSpec {
    /// Object type of the input table.
    pub fn kind(&self) -> Result<ObjectKind> {
        ObjectKind::from_name(&self.key).ok_or_else(|| {
            Error::Configuration(format!("'{}' is not an object table", self.key))
        })
    }

    /// Column names as `&str`.
    pub fn column_refs(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

impl AuxSpec {
    /// Column names as `&str`.
    pub fn column_refs(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

impl DatasetLayout {
    /// Parse a layout file. `.json` is read as JSON, anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
        let layout: DatasetLayout = if ext == "json" {
            serde_json::from_slice(&bytes)?
        } else {
            serde_yaml_ng::from_slice(&bytes).map_err(|e| {
                Error::Configuration(format!("invalid layout {}: {e}", path.display()))
            })?
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Reject layouts that cannot produce a consistent tensor.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(Error::Configuration("layout has no tensor inputs".into()));
        }
        let mut keys = HashSet::new();
        for input in &self.inputs {
            let kind = input.kind()?;
            if !keys.insert(kind) {
                return Err(Error::Configuration(format!("input '{}' listed twice", input.key)));
            }
            if input.rows_per_event == 0 {
                return Err(Error::Configuration(format!(
                    "rows_per_event of '{}' must be at least 1",
                    input.key
                )));
            }
            check_columns(TableKey::Object(kind), &input.columns)?;
        }
        if let Some(aux) = &self.aux {
            let key = match TableKey::from_name(&aux.key) {
                Some(k @ (TableKey::EventChars | TableKey::NumValues)) => k,
                _ => {
                    return Err(Error::Configuration(format!(
                        "aux table '{}' must hold one row per event",
                        aux.key
                    )));
                }
            };
            check_columns(key, &aux.columns)?;
        }
        Ok(())
    }

    /// Number of stored values per sample (all inputs plus aux).
    pub fn values_per_sample(&self) -> usize {
        let tensors: usize = self.inputs.iter().map(|i| i.rows_per_event * i.columns.len()).sum();
        tensors + self.aux.as_ref().map_or(0, |a| a.columns.len())
    }
}
