//! Removal of tracks already claimed by leptons.
//!
//! During filling, every track matched to an electron or muon is recorded by
//! its global row index. Once all events are filled the track table drops
//! those rows and each event's track count is reduced by the number of its
//! own dropped tracks.

use std::collections::BTreeMap;

use hep_core::{Column, Error, ObjectKind, Result};

use crate::table::{CountTable, ObjectTable};

/// Global track row indices to omit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Omissions {
    rows: Vec<usize>,
}

impl Omissions {
    /// Record a matched track row.
    pub fn push(&mut self, row: usize) {
        self.rows.push(row);
    }

    /// Recorded rows, in match order.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Number of recorded rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Drop omitted rows from `tracks` and correct the `EFlowTrack` counts.
///
/// Returns the number of rows dropped. Fails if a row is listed twice or is
/// out of range, or if a correction would make a count negative.
pub fn remove_matched_tracks(
    tracks: &mut ObjectTable,
    counts: &mut CountTable,
    omitted: &Omissions,
) -> Result<usize> {
    let n = tracks.n_rows();
    let mut drop = vec![false; n];
    let mut per_event: BTreeMap<usize, usize> = BTreeMap::new();

    for &row in omitted.rows() {
        if row >= n {
            return Err(Error::Validation(format!(
                "omitted track row {row} out of range ({n} tracks)"
            )));
        }
        if drop[row] {
            return Err(Error::Validation(format!("track row {row} matched more than once")));
        }
        drop[row] = true;
        let entry = tracks.get(row, Column::Entry) as usize;
        *per_event.entry(entry).or_insert(0) += 1;
    }

    let track_counts = counts.counts_mut(ObjectKind::EFlowTrack);
    for (entry, k) in &per_event {
        let slot = track_counts.get_mut(*entry).ok_or_else(|| {
            Error::Validation(format!("omitted track refers to unknown event {entry}"))
        })?;
        let current = *slot;
        *slot = current.checked_sub(*k).ok_or_else(|| {
            Error::Validation(format!("event {entry}: {k} omitted tracks exceed count {current}"))
        })?;
    }

    tracks.remove_rows(&drop);
    tracing::debug!(dropped = omitted.len(), events = per_event.len(), "removed matched tracks");
    Ok(omitted.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PerKind;

    fn tracks(entries: &[usize]) -> ObjectTable {
        let mut t = ObjectTable::with_capacity(ObjectKind::EFlowTrack, entries.len());
        for (i, e) in entries.iter().enumerate() {
            let mut row = t.blank_row();
            t.set_in(&mut row, Column::Entry, *e as f64);
            t.set_in(&mut row, Column::PtOrEt, 1.0 + i as f64);
            t.push_row(&row);
        }
        t
    }

    fn counts(per_event: &[usize]) -> CountTable {
        let mut c = CountTable::with_capacity(per_event.len());
        for n in per_event {
            let mut k = PerKind::<usize>::default();
            k[ObjectKind::EFlowTrack] = *n;
            c.push(&k);
        }
        c
    }

    #[test]
    fn counts_drop_by_omitted_per_event() {
        let raw = [2, 3, 1];
        let mut t = tracks(&[0, 0, 1, 1, 1, 2]);
        let mut c = counts(&raw);
        let mut om = Omissions::default();
        for row in [1, 2, 4] {
            om.push(row);
        }
        assert_eq!(remove_matched_tracks(&mut t, &mut c, &om).unwrap(), 3);
        assert_eq!(c.counts(ObjectKind::EFlowTrack), &[1, 1, 1]);
        assert_eq!(t.column(Column::PtOrEt).unwrap(), &[1.0, 4.0, 6.0]);

        let omitted_per_event = [1, 2, 0];
        for e in 0..3 {
            assert_eq!(c.counts(ObjectKind::EFlowTrack)[e], raw[e] - omitted_per_event[e]);
        }
    }

    #[test]
    fn duplicate_omission_is_rejected() {
        let mut t = tracks(&[0, 0]);
        let mut c = counts(&[2]);
        let mut om = Omissions::default();
        om.push(1);
        om.push(1);
        assert!(remove_matched_tracks(&mut t, &mut c, &om).is_err());
    }

    #[test]
    fn nothing_to_drop() {
        let mut t = tracks(&[0]);
        let mut c = counts(&[1]);
        assert_eq!(remove_matched_tracks(&mut t, &mut c, &Omissions::default()).unwrap(), 0);
        assert_eq!(t.n_rows(), 1);
    }
}
