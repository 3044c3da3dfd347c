//! `hepten inspect`: quick look at a store or a shard.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use hep_io::{TableStore, read_shard};

fn describe_store(path: &Path) -> Result<serde_json::Value> {
    let store = TableStore::open(path)?;
    let mut tables = serde_json::Map::new();
    for key in store.keys()? {
        let rows = store.num_rows(&key).with_context(|| format!("table '{key}'"))?;
        tables.insert(key, rows.into());
    }
    Ok(serde_json::json!({
        "kind": "store",
        "path": path.display().to_string(),
        "n_events": store.n_events().ok(),
        "tables": tables,
    }))
}

fn describe_shard(path: &Path) -> Result<serde_json::Value> {
    let shard = read_shard(path)?;
    let inputs: Vec<serde_json::Value> = shard
        .inputs
        .iter()
        .map(|b| {
            let (n, r, c) = b.data.dim();
            serde_json::json!({ "name": b.name, "shape": [n, r, c], "columns": b.columns })
        })
        .collect();
    let aux = shard.aux.as_ref().map(|a| {
        serde_json::json!({ "shape": [a.data.nrows(), a.data.ncols()], "columns": a.columns })
    });
    let class_counts: Vec<f64> = shard.labels.columns().into_iter().map(|c| c.sum()).collect();
    Ok(serde_json::json!({
        "kind": "shard",
        "path": path.display().to_string(),
        "n_samples": shard.n_samples(),
        "class_counts": class_counts,
        "inputs": inputs,
        "aux": aux,
    }))
}

pub fn cmd_inspect(path: &Path, output: Option<&PathBuf>) -> Result<()> {
    let value = if path.is_dir() {
        describe_store(path).with_context(|| format!("failed to inspect store {}", path.display()))?
    } else {
        describe_shard(path).with_context(|| format!("failed to inspect shard {}", path.display()))?
    };
    crate::write_json(output, value)
}
