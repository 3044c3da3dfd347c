use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use hep_io::{JaggedEvents, write_raw_events};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hepten"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("hepten_cli_pipeline_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn json_stdout(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&out.stdout))
    })
}

fn event(lead_pt: f64, with_electron: bool) -> BTreeMap<String, Vec<f64>> {
    let mut e = BTreeMap::new();
    e.insert("Jet.PT".to_string(), vec![lead_pt, 42.0]);
    e.insert("Jet.Eta".to_string(), vec![0.2, 1.3]);
    e.insert("Jet.Phi".to_string(), vec![-2.0, 1.1]);
    e.insert("MissingET.MET".to_string(), vec![31.0]);
    e.insert("MissingET.Eta".to_string(), vec![0.0]);
    e.insert("MissingET.Phi".to_string(), vec![0.4]);
    if with_electron {
        e.insert("Electron.PT".to_string(), vec![27.0]);
        e.insert("Electron.Eta".to_string(), vec![-0.7]);
        e.insert("Electron.Phi".to_string(), vec![2.5]);
        e.insert("EFlowTrack.PT".to_string(), vec![26.5, 3.0]);
        e.insert("EFlowTrack.Eta".to_string(), vec![-0.7, 0.0]);
        e.insert("EFlowTrack.Phi".to_string(), vec![2.5, 0.0]);
    }
    e
}

/// Raw directory with `files` files of `n` events each; every fifth event has no lepton.
fn raw_dir(name: &str, files: usize, n: usize) -> PathBuf {
    let dir = tmp_path(name);
    std::fs::create_dir_all(&dir).unwrap();
    for f in 0..files {
        let entries: Vec<_> = (0..n).map(|i| event(60.0 + i as f64, i % 5 != 0)).collect();
        write_raw_events(&dir.join(format!("run_{f}.parquet")), &JaggedEvents::from_entries(&entries))
            .unwrap();
    }
    dir
}

fn parse(raw: &Path, out: &Path) -> serde_json::Value {
    let res = run(&[
        "parse",
        raw.to_string_lossy().as_ref(),
        "-o",
        out.to_string_lossy().as_ref(),
        "-p",
        "2",
    ]);
    assert!(res.status.success(), "parse failed, stderr={}", String::from_utf8_lossy(&res.stderr));
    json_stdout(&res)
}

#[test]
fn parse_then_make_datasets() {
    let raw_a = raw_dir("raw_a", 2, 25);
    let raw_b = raw_dir("raw_b", 1, 30);
    let tables_a = tmp_path("tables_a");
    let tables_b = tmp_path("tables_b");

    let summary = parse(&raw_a, &tables_a);
    assert_eq!(summary["n_events"], 40);
    assert_eq!(summary["stores"].as_array().unwrap().len(), 2);
    assert_eq!(summary["skipped"].as_array().unwrap().len(), 0);
    assert_eq!(parse(&raw_b, &tables_b)["n_events"], 24);

    // Second run reuses the stores.
    let again = parse(&raw_b, &tables_b);
    assert_eq!(again["stores"][0]["converted"], false);

    let out = tmp_path("datasets");
    let res = run(&[
        "make-datasets",
        tables_a.to_string_lossy().as_ref(),
        tables_b.to_string_lossy().as_ref(),
        "-o",
        out.to_string_lossy().as_ref(),
        "-n",
        "20",
        "-v",
        "0.25",
        "-s",
        "10",
        "-p",
        "2",
        "--sort-on",
        "PT",
    ]);
    assert!(
        res.status.success(),
        "make-datasets failed, stderr={}",
        String::from_utf8_lossy(&res.stderr)
    );
    let v = json_stdout(&res);
    assert_eq!(v["classes"], 2);
    assert_eq!(v["train"]["samples_per_class"], 15);
    assert_eq!(v["val"]["samples_per_class"], 5);
    assert_eq!(v["train"]["shards"].as_array().unwrap().len(), 2);
    assert_eq!(v["val"]["shards"].as_array().unwrap().len(), 1);

    let shard = out.join("val").join("000.parquet");
    let res = run(&["inspect", shard.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "inspect failed, stderr={}", String::from_utf8_lossy(&res.stderr));
    let info = json_stdout(&res);
    assert_eq!(info["kind"], "shard");
    assert_eq!(info["n_samples"], 10);
    assert_eq!(info["class_counts"], serde_json::json!([5.0, 5.0]));
    assert_eq!(info["inputs"][0]["name"], "Jet");
    assert_eq!(info["inputs"][0]["shape"], serde_json::json!([10, 8, 8]));

    let store = tables_b.join("run_0");
    let res = run(&["inspect", store.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "inspect failed, stderr={}", String::from_utf8_lossy(&res.stderr));
    let info = json_stdout(&res);
    assert_eq!(info["n_events"], 24);
    assert_eq!(info["tables"]["Jet"], 48);
    assert_eq!(info["tables"]["EFlowTrack"], 24, "matched tracks are removed");

    for d in [raw_a, raw_b, tables_a, tables_b, out] {
        std::fs::remove_dir_all(d).ok();
    }
}

#[test]
fn make_datasets_reports_insufficient_data() {
    let raw = raw_dir("raw_small", 1, 10);
    let tables = tmp_path("tables_small");
    parse(&raw, &tables);

    let out = tmp_path("datasets_small");
    let res = run(&[
        "make-datasets",
        tables.to_string_lossy().as_ref(),
        "-o",
        out.to_string_lossy().as_ref(),
        "-n",
        "100",
    ]);
    assert!(!res.status.success());
    let stderr = String::from_utf8_lossy(&res.stderr);
    assert!(stderr.contains("insufficient data"), "stderr={stderr}");
    assert!(!out.join("train").exists());

    for d in [raw, tables] {
        std::fs::remove_dir_all(d).ok();
    }
}

#[test]
fn bad_arguments_are_rejected() {
    let res = run(&["make-datasets", "/nonexistent", "-o", "/tmp/x", "-n", "5", "-s", "big"]);
    assert!(!res.status.success());
    assert!(String::from_utf8_lossy(&res.stderr).contains("--size"));

    let res = run(&["make-datasets", "/nonexistent", "-o", "/tmp/x", "-n", "5", "-v", "2.5"]);
    assert!(!res.status.success());

    let missing = tmp_path("missing_raw");
    let res = run(&["parse", missing.to_string_lossy().as_ref(), "-o", "/tmp/unused"]);
    assert!(!res.status.success());
    assert!(String::from_utf8_lossy(&res.stderr).contains("no such source directory"));
}
