//! Event selection and event-level aggregates.

use serde::{Deserialize, Serialize};

use hep_core::{EventColumn, EventSource, ObjectKind, Result, field_name};

use crate::kinematics::Reference;

/// Event selection thresholds.
///
/// An event passes when at least `min_jets` jets have `PT > jet_pt` and,
/// if `require_lepton`, at least `min_leptons` electrons plus muons have
/// `PT > lepton_pt`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCuts {
    /// Minimum number of hard jets.
    pub min_jets: usize,
    /// Jet PT threshold (GeV).
    pub jet_pt: f64,
    /// Minimum number of hard leptons.
    pub min_leptons: usize,
    /// Lepton PT threshold (GeV).
    pub lepton_pt: f64,
    /// Apply the lepton requirement.
    pub require_lepton: bool,
}

impl Default for SelectionCuts {
    fn default() -> Self {
        Self { min_jets: 2, jet_pt: 40.0, min_leptons: 1, lepton_pt: 20.0, require_lepton: true }
    }
}

impl SelectionCuts {
    /// Evaluate the selection for one raw entry.
    pub fn passes(&self, source: &dyn EventSource, entry: usize) -> Result<bool> {
        let jets = count_above(source, entry, ObjectKind::Jet, self.jet_pt)?;
        if jets < self.min_jets {
            return Ok(false);
        }
        if !self.require_lepton {
            return Ok(true);
        }
        let mut leptons = 0;
        for kind in ObjectKind::LEPTONS {
            leptons += count_above(source, entry, kind, self.lepton_pt)?;
        }
        Ok(leptons >= self.min_leptons)
    }
}

fn count_above(
    source: &dyn EventSource,
    entry: usize,
    kind: ObjectKind,
    threshold: f64,
) -> Result<usize> {
    let pt = source.field_or_empty(entry, &field_name(kind, "PT"))?;
    Ok(pt.iter().filter(|&&v| v > threshold).count())
}

/// Highest-magnitude object of `kind` in `entry`, or `(0, 0, 0)`.
pub fn leading_object(source: &dyn EventSource, entry: usize, kind: ObjectKind) -> Result<Reference> {
    let pt = source.field_or_empty(entry, &field_name(kind, kind.magnitude_field()))?;
    let eta = source.field_or_empty(entry, &field_name(kind, "Eta"))?;
    let phi = source.field_or_empty(entry, &field_name(kind, "Phi"))?;
    Ok(Reference::leading(pt, eta, phi))
}

/// Per-event references shared by every object of the event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventReferences {
    /// Leading lepton across electrons then muons.
    pub lepton: Reference,
    /// Missing transverse energy.
    pub met: Reference,
    /// Leading jet.
    pub jet: Reference,
}

impl EventReferences {
    /// Resolve the references of `entry`.
    pub fn resolve(source: &dyn EventSource, entry: usize) -> Result<Self> {
        let mut lepton = Reference::default();
        for kind in ObjectKind::LEPTONS {
            lepton = lepton.max(leading_object(source, entry, kind)?);
        }
        Ok(Self {
            lepton,
            met: leading_object(source, entry, ObjectKind::MissingEt)?,
            jet: leading_object(source, entry, ObjectKind::Jet)?,
        })
    }
}

/// Event-level aggregates of one kept event, in [`EventColumn::ALL`] order.
pub fn event_aggregates(
    source: &dyn EventSource,
    entry: usize,
    new_entry: usize,
    refs: &EventReferences,
) -> Result<[f64; EventColumn::ALL.len()]> {
    let jet_pt = source.field_or_empty(entry, &field_name(ObjectKind::Jet, "PT"))?;
    let n_muons = source.field_or_empty(entry, &field_name(ObjectKind::MuonTight, "Phi"))?.len();
    let n_electrons = source.field_or_empty(entry, &field_name(ObjectKind::Electron, "Phi"))?.len();

    let mut row = [0.0; EventColumn::ALL.len()];
    for (slot, col) in row.iter_mut().zip(EventColumn::ALL) {
        *slot = match col {
            EventColumn::Entry => new_entry as f64,
            EventColumn::Met => refs.met.pt,
            EventColumn::Ht => jet_pt.iter().sum(),
            EventColumn::MuonMul => n_muons as f64,
            EventColumn::ElectronMul => n_electrons as f64,
            EventColumn::JetMul => jet_pt.len() as f64,
            EventColumn::MaxJetPt => refs.jet.pt,
            EventColumn::MaxLepPt => refs.lepton.pt,
        };
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_io::JaggedEvents;
    use std::collections::BTreeMap;

    fn entry(fields: &[(&str, Vec<f64>)]) -> BTreeMap<String, Vec<f64>> {
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn default_cuts() {
        let ev = JaggedEvents::from_entries(&[
            entry(&[("Jet.PT", vec![50.0, 45.0]), ("Electron.PT", vec![30.0])]),
            entry(&[("Jet.PT", vec![50.0]), ("Electron.PT", vec![30.0])]),
            entry(&[("Jet.PT", vec![50.0, 45.0]), ("MuonTight.PT", vec![15.0])]),
            entry(&[("Jet.PT", vec![50.0, 40.0]), ("MuonTight.PT", vec![25.0])]),
        ]);
        let cuts = SelectionCuts::default();
        let passed: Vec<bool> = (0..4).map(|i| cuts.passes(&ev, i).unwrap()).collect();
        assert_eq!(passed, vec![true, false, false, false]);

        let no_lep = SelectionCuts { require_lepton: false, ..cuts };
        assert!(no_lep.passes(&ev, 2).unwrap());
    }

    #[test]
    fn aggregates_and_references() {
        let ev = JaggedEvents::from_entries(&[entry(&[
            ("Jet.PT", vec![50.0, 45.0]),
            ("Jet.Eta", vec![0.1, 0.2]),
            ("Jet.Phi", vec![0.3, 0.4]),
            ("Electron.PT", vec![30.0]),
            ("Electron.Eta", vec![1.0]),
            ("Electron.Phi", vec![2.0]),
            ("MuonTight.PT", vec![30.0, 10.0]),
            ("MuonTight.Eta", vec![-1.0, 0.0]),
            ("MuonTight.Phi", vec![-2.0, 0.0]),
            ("MissingET.MET", vec![12.5]),
            ("MissingET.Eta", vec![0.0]),
            ("MissingET.Phi", vec![1.5]),
        ])]);
        let refs = EventReferences::resolve(&ev, 0).unwrap();
        // Electron listed first wins the tie.
        assert_eq!(refs.lepton, Reference { pt: 30.0, eta: 1.0, phi: 2.0 });
        assert_eq!(refs.met, Reference { pt: 12.5, eta: 0.0, phi: 1.5 });

        let row = event_aggregates(&ev, 0, 7, &refs).unwrap();
        assert_eq!(row, [7.0, 12.5, 95.0, 2.0, 1.0, 2.0, 50.0, 30.0]);
    }
}
