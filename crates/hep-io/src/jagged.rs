//! In-memory raw events, the [`EventSource`] every conversion reads from.

use std::collections::{BTreeMap, HashMap};

use hep_core::{Error, EventSource, Result};

/// One `<Object>.<Field>` column: the values of every entry back to back,
/// plus where each entry ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RaggedField {
    values: Vec<f64>,
    ends: Vec<usize>,
}

impl RaggedField {
    pub(crate) fn push(&mut self, entry: &[f64]) {
        self.values.extend_from_slice(entry);
        self.ends.push(self.values.len());
    }

    fn n_entries(&self) -> usize {
        self.ends.len()
    }

    fn entry(&self, i: usize) -> &[f64] {
        let begin = if i == 0 { 0 } else { self.ends[i - 1] };
        &self.values[begin..self.ends[i]]
    }
}

/// Raw events held in memory, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct JaggedEvents {
    n_entries: usize,
    fields: HashMap<String, RaggedField>,
}

impl JaggedEvents {
    /// An empty source with `n_entries` entries and no fields.
    pub fn new(n_entries: usize) -> Self {
        Self { n_entries, fields: HashMap::new() }
    }

    pub(crate) fn insert(&mut self, name: String, field: RaggedField) -> Result<()> {
        if field.n_entries() != self.n_entries {
            return Err(Error::Validation(format!(
                "field '{name}' has {} entries, expected {}",
                field.n_entries(),
                self.n_entries
            )));
        }
        self.fields.insert(name, field);
        Ok(())
    }

    /// Build from per-entry maps of field name to values.
    ///
    /// A field absent from an entry is treated as having no objects there.
    pub fn from_entries(entries: &[BTreeMap<String, Vec<f64>>]) -> Self {
        let mut names: Vec<&String> = entries.iter().flat_map(|e| e.keys()).collect();
        names.sort();
        names.dedup();

        let mut fields = HashMap::with_capacity(names.len());
        for name in names {
            let mut field = RaggedField::default();
            for entry in entries {
                field.push(entry.get(name).map(|v| v.as_slice()).unwrap_or(&[]));
            }
            fields.insert(name.clone(), field);
        }
        Self { n_entries: entries.len(), fields }
    }

    /// Field names, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl EventSource for JaggedEvents {
    fn n_entries(&self) -> usize {
        self.n_entries
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn field(&self, entry: usize, name: &str) -> Result<&[f64]> {
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| Error::Validation(format!("missing raw field '{name}'")))?;
        if entry >= self.n_entries {
            return Err(Error::Validation(format!(
                "entry {entry} out of range for '{name}' ({} entries)",
                self.n_entries
            )));
        }
        Ok(field.entry(entry))
    }
}
