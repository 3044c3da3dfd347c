//! Core traits for hepten
//!
//! The feature pipeline only depends on two things from the outside world:
//! read access to raw per-event fields, and somewhere to report progress.

use crate::Result;

/// Read-only accessor over raw detector records.
///
/// Fields are addressed by their `<Object>.<Field>` name and are jagged: each
/// entry holds a variable-length slice with one value per object instance.
pub trait EventSource: Send + Sync {
    /// Number of raw entries.
    fn n_entries(&self) -> usize;

    /// Whether the named field exists in this source.
    fn has_field(&self, name: &str) -> bool;

    /// Values of `name` for `entry`.
    ///
    /// Errors when the field is missing or `entry` is out of range.
    fn field(&self, entry: usize, name: &str) -> Result<&[f64]>;

    /// Values of `name` for `entry`, or an empty slice when the field is absent.
    fn field_or_empty(&self, entry: usize, name: &str) -> Result<&[f64]> {
        if self.has_field(name) { self.field(entry, name) } else { Ok(&[]) }
    }
}

/// Sink for progress of long-running scans.
pub trait Progress {
    /// A scan over `total` items named `label` begins.
    fn start(&mut self, label: &str, total: usize);

    /// `done` items have been processed so far.
    fn advance(&mut self, done: usize);

    /// The scan is complete.
    fn finish(&mut self);
}
