//! Raw file → table store ingestion.
//!
//! Every raw file becomes one store directory named after the file stem.
//! Bulk ingestion spreads files over a [`WorkerPool`]; a file that fails to
//! decode or to persist is logged and skipped without stopping the others.

use std::path::{Path, PathBuf};

use hep_core::{Error, Result, TableKey, WorkerPool};
use hep_io::{TableStore, read_raw_events};

use crate::builder::{ConvertOptions, convert};
use crate::progress::LogProgress;

/// Extension of raw-event files picked up by [`parse_directory`].
pub const RAW_EXTENSION: &str = "parquet";

/// Outcome of [`store_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Store directory.
    pub store_dir: PathBuf,
    /// Events in the store.
    pub n_events: usize,
    /// False when an existing complete store was reused.
    pub converted: bool,
}

/// Store directory used for `raw` under `out_dir`.
pub fn store_dir_for(raw: &Path, out_dir: &Path) -> PathBuf {
    let stem = raw.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    out_dir.join(stem)
}

fn is_complete(store: &TableStore) -> bool {
    TableKey::all().into_iter().all(|k| store.contains(k.name()))
}

/// Convert one raw file into a table store.
///
/// An existing store that already holds every table is reused unless `redo`.
pub fn store_file(raw: &Path, out_dir: &Path, redo: bool, opts: &ConvertOptions) -> Result<StoredFile> {
    let store_dir = store_dir_for(raw, out_dir);
    if !redo
        && store_dir.is_dir()
        && let Ok(existing) = TableStore::open(&store_dir)
        && is_complete(&existing)
    {
        let n_events = existing.n_events()?;
        tracing::info!(store = %store_dir.display(), n_events, "store exists, skipping");
        return Ok(StoredFile { store_dir, n_events, converted: false });
    }

    tracing::info!(raw = %raw.display(), "converting");
    let events = read_raw_events(raw)?;
    let mut progress = LogProgress::new();
    let out = convert(&events, opts, &mut progress)?;
    let mut summary = out.summary;
    summary.path = Some(raw.to_path_buf());

    let store = TableStore::create(&store_dir)?;
    for (key, frame) in out.tables.into_frames()? {
        store.put(key.name(), &frame)?;
    }
    summary.log();
    Ok(StoredFile { store_dir, n_events: summary.kept, converted: true })
}

/// Settings for [`parse_directory`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Per-file conversion settings.
    pub convert: ConvertOptions,
    /// Reconvert files whose store already exists.
    pub redo: bool,
    /// Number of concurrent workers.
    pub workers: usize,
    /// Stop once this many events are stored (split evenly over workers).
    pub num_samples: Option<usize>,
}

/// Totals of a [`parse_directory`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Stores written or reused.
    pub stores: Vec<StoredFile>,
    /// Raw files skipped after a recoverable error.
    pub skipped: Vec<PathBuf>,
}

impl ParseReport {
    /// Events across all stores.
    pub fn n_events(&self) -> usize {
        self.stores.iter().map(|s| s.n_events).sum()
    }
}

/// Raw-event files directly under `dir`, sorted.
pub fn list_raw_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::MissingSource(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(RAW_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Convert every raw file under `input_dir` into stores under `out_dir`.
///
/// Files are assigned round-robin to workers. Each worker stops after its
/// share `ceil(num_samples / workers)` of events when a budget is given.
pub fn parse_directory(input_dir: &Path, out_dir: &Path, opts: &ParseOptions) -> Result<ParseReport> {
    let files = list_raw_files(input_dir)?;
    if files.is_empty() {
        return Err(Error::MissingSource(input_dir.to_path_buf()));
    }
    std::fs::create_dir_all(out_dir).map_err(|e| Error::write(out_dir, e))?;

    let pool = WorkerPool::new(opts.workers);
    let budget = opts.num_samples.map(|n| n.div_ceil(pool.workers()));
    tracing::info!(files = files.len(), workers = pool.workers(), ?budget, "parsing raw files");

    let report = std::sync::Mutex::new(ParseReport::default());
    pool.run_partitions(files, |worker, part, abort| {
        let mut read = 0usize;
        for raw in part {
            abort.check()?;
            match store_file(&raw, out_dir, opts.redo, &opts.convert) {
                Ok(stored) => {
                    read += stored.n_events;
                    tracing::info!(worker, read, ?budget, "stored {}", stored.store_dir.display());
                    report.lock().unwrap_or_else(|p| p.into_inner()).stores.push(stored);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(worker, raw = %raw.display(), "skipping: {e}");
                    report.lock().unwrap_or_else(|p| p.into_inner()).skipped.push(raw);
                    continue;
                }
                Err(e) => return Err(e),
            }
            if budget.is_some_and(|b| read >= b) {
                break;
            }
        }
        Ok(())
    })?;

    let mut report = report.into_inner().unwrap_or_else(|p| p.into_inner());
    report.stores.sort_by(|a, b| a.store_dir.cmp(&b.store_dir));
    report.skipped.sort();
    Ok(report)
}
