//! Two-pass conversion of raw events into feature tables.
//!
//! [`count_pass`] scans every raw entry once and totals the objects of each
//! type, kept or not, so that [`fill_pass`] can allocate every column exactly
//! once. The fill pass then walks the entries again, applies the selection,
//! and for each kept event:
//!
//! 1. resolves the leading lepton, MET and leading jet references,
//! 2. appends one complete row per object with its four-vector and
//!    lepton/MET-relative features (jets get their raw observables instead),
//! 3. matches electrons and muons to their nearest unclaimed track and copies
//!    the track's spatial attributes,
//! 4. computes the isolation columns, with matched tracks excluded from the
//!    charged-hadron sums.
//!
//! [`convert`] runs both passes and then drops the matched tracks.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use hep_core::{
    Column, EventSource, ISOLATION_PAIRS, ObjectKind, Progress, Result, TableKey, field_name,
};
use hep_io::Frame;

use crate::dedup::{Omissions, remove_matched_tracks};
use crate::geometry::{DistanceMatrix, argmin_excluding};
use crate::isolation::{Cone, IsolationConfig, isolation, self_isolation};
use crate::kinematics::{FourVector, RelativeFeatures};
use crate::reduction::{EventReferences, SelectionCuts, event_aggregates};
use crate::table::{CountTable, EventTable, ObjectTable, PerKind};

/// Settings for converting one raw file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Event selection.
    pub cuts: SelectionCuts,
    /// Isolation cone.
    pub isolation: IsolationConfig,
    /// Only read the first `max_entries` raw entries.
    pub max_entries: Option<usize>,
}

/// Result of the sizing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCounts {
    /// Number of raw entries scanned.
    pub n_entries: usize,
    /// Total objects of each type across all scanned entries.
    pub totals: PerKind<usize>,
}

/// Number of raw entries the options allow reading from `source`.
pub fn entries_to_read(source: &dyn EventSource, opts: &ConvertOptions) -> usize {
    let n = source.n_entries();
    opts.max_entries.map_or(n, |m| m.min(n))
}

/// Total the objects of every type over the first `n_entries` entries.
///
/// Object multiplicity is the length of the type's `Phi` field.
pub fn count_pass(
    source: &dyn EventSource,
    n_entries: usize,
    progress: &mut dyn Progress,
) -> Result<ObjectCounts> {
    let phi_fields = PerKind::from_fn(|k| field_name(k, "Phi"));
    let mut totals = PerKind::<usize>::default();
    progress.start("count", n_entries);
    for entry in 0..n_entries {
        for (kind, name) in phi_fields.iter() {
            totals[kind] += source.field_or_empty(entry, name)?.len();
        }
        progress.advance(entry + 1);
    }
    progress.finish();
    Ok(ObjectCounts { n_entries, totals })
}

/// Feature tables of one raw file, before track removal.
#[derive(Debug, Clone)]
pub struct FeatureTables {
    /// One table per object type.
    pub objects: PerKind<ObjectTable>,
    /// Event-level aggregates.
    pub event_chars: EventTable,
    /// Per-event object counts.
    pub num_values: CountTable,
    /// Track rows claimed by leptons.
    pub omissions: Omissions,
}

impl FeatureTables {
    fn with_capacity(sizes: &ObjectCounts) -> Self {
        Self {
            objects: PerKind::from_fn(|k| ObjectTable::with_capacity(k, sizes.totals[k])),
            event_chars: EventTable::with_capacity(sizes.n_entries),
            num_values: CountTable::with_capacity(sizes.n_entries),
            omissions: Omissions::default(),
        }
    }

    /// Number of kept events.
    pub fn n_events(&self) -> usize {
        self.event_chars.n_rows()
    }

    /// Every table as a storage frame, keyed for the table store.
    pub fn into_frames(self) -> Result<Vec<(TableKey, Frame)>> {
        let mut out = Vec::with_capacity(ObjectKind::ALL.len() + 2);
        for (kind, table) in self.objects.into_iter_kinds() {
            out.push((TableKey::Object(kind), table.into_frame()?));
        }
        out.push((TableKey::EventChars, self.event_chars.into_frame()?));
        out.push((TableKey::NumValues, self.num_values.into_frame()?));
        Ok(out)
    }
}

/// Outcome of the fill pass.
#[derive(Debug, Clone)]
pub struct FillResult {
    /// Filled tables.
    pub tables: FeatureTables,
    /// Entries that passed the selection.
    pub kept: usize,
    /// Entries rejected by the selection.
    pub dropped: usize,
}

/// Fill the feature tables for every entry that passes the selection.
pub fn fill_pass(
    source: &dyn EventSource,
    sizes: &ObjectCounts,
    opts: &ConvertOptions,
    progress: &mut dyn Progress,
) -> Result<FillResult> {
    opts.isolation.validate()?;
    let mut filler = Filler { source, opts, tables: FeatureTables::with_capacity(sizes) };
    let mut dropped = 0;

    progress.start("fill", sizes.n_entries);
    for entry in 0..sizes.n_entries {
        if opts.cuts.passes(source, entry)? {
            let new_entry = filler.tables.n_events();
            filler.fill_event(entry, new_entry)?;
        } else {
            dropped += 1;
        }
        progress.advance(entry + 1);
    }
    progress.finish();

    let kept = filler.tables.n_events();
    Ok(FillResult { tables: filler.tables, kept, dropped })
}

struct Filler<'a> {
    source: &'a dyn EventSource,
    opts: &'a ConvertOptions,
    tables: FeatureTables,
}

/// (η, φ, magnitude) of one type within one event.
#[derive(Debug, Default)]
struct EventCone {
    eta: Vec<f64>,
    phi: Vec<f64>,
    pt: Vec<f64>,
}

impl EventCone {
    fn as_cone(&self) -> Cone<'_> {
        Cone { eta: &self.eta, phi: &self.phi, energy: &self.pt }
    }
}

#[inline]
fn at(values: &[f64], i: usize) -> f64 {
    values.get(i).copied().unwrap_or(0.0)
}

impl<'a> Filler<'a> {
    fn raw(&self, entry: usize, kind: ObjectKind, field: &str) -> Result<&'a [f64]> {
        self.source.field_or_empty(entry, &field_name(kind, field))
    }

    fn fill_event(&mut self, entry: usize, new_entry: usize) -> Result<()> {
        let refs = EventReferences::resolve(self.source, entry)?;
        let aggregates = event_aggregates(self.source, entry, new_entry, &refs)?;
        self.tables.event_chars.push(aggregates);

        let mut start = PerKind::<usize>::default();
        let mut n = PerKind::<usize>::default();
        for kind in ObjectKind::ALL {
            start[kind] = self.tables.objects[kind].n_rows();
            n[kind] = if kind == ObjectKind::Jet {
                self.fill_jets(entry, new_entry)?
            } else {
                self.fill_objects(kind, entry, new_entry, &refs)?
            };
        }
        self.tables.num_values.push(&n);

        let claimed = self.match_tracks(&start, &n)?;
        self.fill_isolation(&start, &n, &claimed)
    }

    fn fill_objects(
        &mut self,
        kind: ObjectKind,
        entry: usize,
        new_entry: usize,
        refs: &EventReferences,
    ) -> Result<usize> {
        let pt = self.raw(entry, kind, kind.magnitude_field())?;
        let eta = self.raw(entry, kind, "Eta")?;
        let phi = self.raw(entry, kind, "Phi")?;
        let extras: Vec<(Column, &[f64])> = kind
            .raw_extras()
            .iter()
            .map(|c| Ok((*c, self.raw(entry, kind, c.name())?)))
            .collect::<Result<_>>()?;

        let table = &mut self.tables.objects[kind];
        let n = phi.len();
        for i in 0..n {
            let (pt_i, eta_i, phi_i) = (at(pt, i), at(eta, i), phi[i]);
            let p4 = FourVector::from_pt_eta_phi_m(pt_i, eta_i, phi_i, kind.mass());
            let lep = RelativeFeatures::new(&refs.lepton, pt_i, eta_i, phi_i);
            let met = RelativeFeatures::new(&refs.met, pt_i, eta_i, phi_i);

            let mut row = table.blank_row();
            for (col, v) in [
                (Column::Entry, new_entry as f64),
                (Column::Energy, p4.e),
                (Column::Px, p4.px),
                (Column::Py, p4.py),
                (Column::Pz, p4.pz),
                (Column::PtOrEt, pt_i),
                (Column::Eta, eta_i),
                (Column::Phi, phi_i),
                (Column::MaxLepDeltaEta, lep.delta_eta),
                (Column::MaxLepDeltaPhi, lep.delta_phi),
                (Column::MaxLepDeltaR, lep.delta_r),
                (Column::MaxLepKt, lep.kt),
                (Column::MaxLepAntiKt, lep.anti_kt),
                (Column::MetDeltaEta, met.delta_eta),
                (Column::MetDeltaPhi, met.delta_phi),
                (Column::MetDeltaR, met.delta_r),
                (Column::MetKt, met.kt),
                (Column::MetAntiKt, met.anti_kt),
            ] {
                table.set_in(&mut row, col, v);
            }
            for (col, values) in &extras {
                table.set_in(&mut row, *col, at(values, i));
            }
            table.push_row(&row);
        }
        Ok(n)
    }

    fn fill_jets(&mut self, entry: usize, new_entry: usize) -> Result<usize> {
        let kind = ObjectKind::Jet;
        let n = self.raw(entry, kind, "Phi")?.len();
        let fields: Vec<(Column, &[f64])> = kind.schema()[5..]
            .iter()
            .map(|c| Ok((*c, self.raw(entry, kind, c.name())?)))
            .collect::<Result<_>>()?;
        let value = |col: Column, i: usize| {
            fields.iter().find(|(c, _)| *c == col).map_or(0.0, |(_, v)| at(v, i))
        };

        let table = &mut self.tables.objects[kind];
        for i in 0..n {
            let p4 = FourVector::from_pt_eta_phi_m(
                value(Column::Pt, i),
                value(Column::Eta, i),
                value(Column::Phi, i),
                value(Column::Mass, i),
            );
            let mut row = table.blank_row();
            table.set_in(&mut row, Column::Entry, new_entry as f64);
            table.set_in(&mut row, Column::Energy, p4.e);
            table.set_in(&mut row, Column::Px, p4.px);
            table.set_in(&mut row, Column::Py, p4.py);
            table.set_in(&mut row, Column::Pz, p4.pz);
            for (col, values) in &fields {
                table.set_in(&mut row, *col, at(values, i));
            }
            table.push_row(&row);
        }
        Ok(n)
    }

    /// Match each lepton to its nearest unclaimed track of the same event.
    ///
    /// Returns the per-event claim mask over the event's tracks.
    fn match_tracks(&mut self, start: &PerKind<usize>, n: &PerKind<usize>) -> Result<Vec<bool>> {
        let trk = ObjectKind::EFlowTrack;
        let (trk_start, n_trk) = (start[trk], n[trk]);
        let mut claimed = vec![false; n_trk];
        if n_trk == 0 {
            return Ok(claimed);
        }

        for kind in ObjectKind::ALL.into_iter().filter(|k| k.is_track_matched()) {
            let (lep_start, n_lep) = (start[kind], n[kind]);
            if n_lep == 0 {
                continue;
            }
            let dr2 = {
                let leps = &self.tables.objects[kind];
                let tracks = &self.tables.objects[trk];
                DistanceMatrix::new(
                    leps.column_range(Column::Eta, lep_start, n_lep),
                    leps.column_range(Column::Phi, lep_start, n_lep),
                    tracks.column_range(Column::Eta, trk_start, n_trk),
                    tracks.column_range(Column::Phi, trk_start, n_trk),
                )?
            };
            for i in 0..n_lep {
                let Some(j) = argmin_excluding(dr2.row(i), Some(&claimed)) else {
                    tracing::trace!(lepton = kind.name(), "no unclaimed track left");
                    break;
                };
                claimed[j] = true;
                self.tables.omissions.push(trk_start + j);

                let tracks = &self.tables.objects[trk];
                let copied = [Column::X, Column::Y, Column::Z, Column::Dxy]
                    .map(|c| (c, tracks.get(trk_start + j, c)));
                let leps = &mut self.tables.objects[kind];
                for (c, v) in copied {
                    leps.set(lep_start + i, c, v);
                }
            }
        }
        Ok(claimed)
    }

    fn fill_isolation(
        &mut self,
        start: &PerKind<usize>,
        n: &PerKind<usize>,
        claimed: &[bool],
    ) -> Result<()> {
        let cones = PerKind::from_fn(|kind| {
            let t = &self.tables.objects[kind];
            let pt_col = if kind == ObjectKind::Jet { Column::Pt } else { Column::PtOrEt };
            let mut cone = EventCone {
                eta: t.column_range(Column::Eta, start[kind], n[kind]).to_vec(),
                phi: t.column_range(Column::Phi, start[kind], n[kind]).to_vec(),
                pt: t.column_range(pt_col, start[kind], n[kind]).to_vec(),
            };
            if kind == ObjectKind::EFlowTrack {
                for v in [&mut cone.eta, &mut cone.phi, &mut cone.pt] {
                    let mut unclaimed = claimed.iter().map(|c| !c);
                    v.retain(|_| unclaimed.next().unwrap_or(false));
                }
            }
            cone
        });

        let cfg = &self.opts.isolation;
        for kind in ObjectKind::ALL.into_iter().filter(|k| k.computes_isolation()) {
            if n[kind] == 0 {
                continue;
            }
            for (col, ref_kind) in ISOLATION_PAIRS {
                let values = if ref_kind == kind {
                    self_isolation(cones[kind].as_cone(), cfg)?
                } else {
                    isolation(cones[kind].as_cone(), cones[ref_kind].as_cone(), cfg)?
                };
                let table = &mut self.tables.objects[kind];
                for (i, v) in values.into_iter().enumerate() {
                    table.set(start[kind] + i, col, v);
                }
            }
        }
        Ok(())
    }
}

/// End-of-file report.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    /// Raw file, when converting from disk.
    pub path: Option<PathBuf>,
    /// Raw entries scanned.
    pub n_entries: usize,
    /// Events kept.
    pub kept: usize,
    /// Events rejected.
    pub dropped: usize,
    /// Track rows removed after matching.
    pub tracks_removed: usize,
    /// Wall time of the conversion.
    pub elapsed: Duration,
}

impl ConversionSummary {
    /// Percentage of entries kept.
    pub fn kept_percent(&self) -> f64 {
        if self.n_entries == 0 { 0.0 } else { 100.0 * self.kept as f64 / self.n_entries as f64 }
    }

    /// Emit the summary as an `info` event.
    pub fn log(&self) {
        let path = self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        tracing::info!(
            path = %path,
            kept = self.kept,
            dropped = self.dropped,
            tracks_removed = self.tracks_removed,
            elapsed_s = self.elapsed.as_secs_f64(),
            "converted {} of {} entries ({:.3}% retained, {:.3}% omitted)",
            self.kept,
            self.n_entries,
            self.kept_percent(),
            100.0 - self.kept_percent(),
        );
    }
}

/// Feature tables plus their summary.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Tables with matched tracks removed.
    pub tables: FeatureTables,
    /// Counters for the run.
    pub summary: ConversionSummary,
}

/// Run the count pass, the fill pass and track removal.
pub fn convert(
    source: &dyn EventSource,
    opts: &ConvertOptions,
    progress: &mut dyn Progress,
) -> Result<ConversionOutput> {
    let t0 = Instant::now();
    let n_entries = entries_to_read(source, opts);
    let sizes = count_pass(source, n_entries, progress)?;
    tracing::debug!(n_entries, "count pass done");

    let FillResult { mut tables, kept, dropped } = fill_pass(source, &sizes, opts, progress)?;
    let tracks_removed = {
        let FeatureTables { objects, num_values, omissions, .. } = &mut tables;
        remove_matched_tracks(&mut objects[ObjectKind::EFlowTrack], num_values, omissions)?
    };

    let summary = ConversionSummary {
        path: None,
        n_entries,
        kept,
        dropped,
        tracks_removed,
        elapsed: t0.elapsed(),
    };
    Ok(ConversionOutput { tables, summary })
}
