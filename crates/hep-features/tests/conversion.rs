use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use hep_core::{Column, Error, ObjectKind, TableKey, field_name};
use hep_features::{
    ConvertOptions, NoProgress, ParseOptions, convert, nearest_match, parse_directory, store_file,
};
use hep_io::{JaggedEvents, TableStore, write_raw_events};

type Entry = BTreeMap<String, Vec<f64>>;

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("hepten_features_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn objects(e: &mut Entry, kind: ObjectKind, pt: &[f64], eta: &[f64], phi: &[f64]) {
    e.insert(field_name(kind, kind.magnitude_field()), pt.to_vec());
    e.insert(field_name(kind, "Eta"), eta.to_vec());
    e.insert(field_name(kind, "Phi"), phi.to_vec());
}

/// 2 jets (50, 45) and 1 electron (30): passes the default cuts.
fn two_jets_one_electron() -> Entry {
    let mut e = Entry::new();
    objects(&mut e, ObjectKind::Jet, &[50.0, 45.0], &[0.4, -1.1], &[0.2, 2.9]);
    e.insert(field_name(ObjectKind::Jet, "Mass"), vec![6.0, 5.5]);
    objects(&mut e, ObjectKind::Electron, &[30.0], &[0.9], &[-0.4]);
    objects(&mut e, ObjectKind::MissingEt, &[35.0], &[0.0], &[1.7]);
    objects(&mut e, ObjectKind::EFlowTrack, &[29.5, 2.0, 1.5], &[0.9, 0.1, -2.0], &[-0.41, 1.0, 0.5]);
    objects(&mut e, ObjectKind::EFlowNeutralHadron, &[3.0], &[0.3], &[0.3]);
    e
}

/// 1 jet at 50: fails the jet requirement.
fn one_jet() -> Entry {
    let mut e = Entry::new();
    objects(&mut e, ObjectKind::Jet, &[50.0], &[0.0], &[0.0]);
    objects(&mut e, ObjectKind::Electron, &[30.0], &[0.5], &[0.5]);
    objects(&mut e, ObjectKind::EFlowTrack, &[4.0, 5.0], &[0.5, 1.0], &[0.5, 1.0]);
    e
}

#[test]
fn selection_keeps_and_renumbers_events() {
    let ev = JaggedEvents::from_entries(&[one_jet(), two_jets_one_electron(), one_jet()]);
    let out = convert(&ev, &ConvertOptions::default(), &mut NoProgress).unwrap();

    assert_eq!(out.summary.n_entries, 3);
    assert_eq!(out.summary.kept, 1);
    assert_eq!(out.summary.dropped, 2);

    let t = &out.tables;
    assert_eq!(t.n_events(), 1);
    assert_eq!(t.objects[ObjectKind::Jet].n_rows(), 2);
    assert_eq!(t.objects[ObjectKind::Electron].n_rows(), 1);
    assert_eq!(t.objects[ObjectKind::MissingEt].n_rows(), 1);
    assert_eq!(t.objects[ObjectKind::Photon].n_rows(), 0);
    // One of three tracks was claimed by the electron.
    assert_eq!(t.objects[ObjectKind::EFlowTrack].n_rows(), 2);
    assert_eq!(t.num_values.counts(ObjectKind::EFlowTrack), &[2]);
    assert_eq!(t.num_values.counts(ObjectKind::Jet), &[2]);

    for kind in ObjectKind::ALL {
        if let Some(entries) = t.objects[kind].column(Column::Entry) {
            assert!(entries.iter().all(|&e| e == 0.0), "{}", kind.name());
        }
    }
}

#[test]
fn identical_tracks_match_the_lower_index() {
    assert_eq!(nearest_match(&[0.9], &[-0.4], &[0.9, 0.9], &[-0.4, -0.4]).unwrap(), vec![0]);

    let mut e = two_jets_one_electron();
    objects(&mut e, ObjectKind::EFlowTrack, &[11.0, 22.0], &[0.9, 0.9], &[-0.4, -0.4]);
    e.insert(field_name(ObjectKind::EFlowTrack, "Z"), vec![1.0, 2.0]);
    let ev = JaggedEvents::from_entries(&[e]);
    let out = convert(&ev, &ConvertOptions::default(), &mut NoProgress).unwrap();

    let ele = &out.tables.objects[ObjectKind::Electron];
    assert_eq!(ele.get(0, Column::Z), 1.0);
    let trk = &out.tables.objects[ObjectKind::EFlowTrack];
    assert_eq!(trk.column(Column::PtOrEt).unwrap(), &[22.0]);
}

#[test]
fn two_leptons_never_share_a_track() {
    let mut e = two_jets_one_electron();
    objects(&mut e, ObjectKind::MuonTight, &[25.0], &[0.9], &[-0.4]);
    objects(&mut e, ObjectKind::EFlowTrack, &[30.0, 25.0], &[0.9, 0.95], &[-0.4, -0.4]);
    let ev = JaggedEvents::from_entries(&[e]);
    let out = convert(&ev, &ConvertOptions::default(), &mut NoProgress).unwrap();

    assert_eq!(out.summary.tracks_removed, 2);
    assert_eq!(out.tables.objects[ObjectKind::EFlowTrack].n_rows(), 0);
    assert_eq!(out.tables.num_values.counts(ObjectKind::EFlowTrack), &[0]);
}

#[test]
fn store_file_writes_every_table_and_reuses_it() {
    let dir = tmp_dir("store");
    let raw = dir.join("ttbar_001.parquet");
    let ev = JaggedEvents::from_entries(&[two_jets_one_electron(), one_jet(), two_jets_one_electron()]);
    write_raw_events(&raw, &ev).unwrap();

    let out_dir = dir.join("tables");
    let first = store_file(&raw, &out_dir, false, &ConvertOptions::default()).unwrap();
    assert!(first.converted);
    assert_eq!(first.n_events, 2);
    assert_eq!(first.store_dir, out_dir.join("ttbar_001"));

    let store = TableStore::open(&first.store_dir).unwrap();
    for key in TableKey::all() {
        assert!(store.contains(key.name()), "missing {}", key.name());
    }
    assert_eq!(store.n_events().unwrap(), 2);
    let ev_chars = store.get("EventChars").unwrap();
    assert_eq!(ev_chars.column("Entry").unwrap(), &[0.0, 1.0]);
    assert_eq!(ev_chars.column("HT").unwrap(), &[95.0, 95.0]);

    let again = store_file(&raw, &out_dir, false, &ConvertOptions::default()).unwrap();
    assert!(!again.converted);
    assert_eq!(again.n_events, 2);

    let redo = store_file(&raw, &out_dir, true, &ConvertOptions::default()).unwrap();
    assert!(redo.converted);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn parse_directory_skips_corrupt_files() {
    let dir = tmp_dir("parse");
    let raw_dir = dir.join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    for i in 0..3 {
        let ev = JaggedEvents::from_entries(&[two_jets_one_electron(), two_jets_one_electron()]);
        write_raw_events(&raw_dir.join(format!("sample_{i}.parquet")), &ev).unwrap();
    }
    std::fs::write(raw_dir.join("broken.parquet"), b"truncated").unwrap();

    let opts = ParseOptions { workers: 2, ..Default::default() };
    let report = parse_directory(&raw_dir, &dir.join("tables"), &opts).unwrap();
    assert_eq!(report.stores.len(), 3);
    assert_eq!(report.n_events(), 6);
    assert_eq!(report.skipped, vec![raw_dir.join("broken.parquet")]);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn parse_directory_requires_raw_files() {
    let dir = tmp_dir("empty");
    let err = parse_directory(&dir, &dir.join("out"), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingSource(_)));
    std::fs::remove_dir_all(&dir).ok();
}
