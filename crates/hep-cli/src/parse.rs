//! `hepten parse`: raw event files → table stores.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use hep_features::{ConvertOptions, ParseOptions, parse_directory};

pub struct ParseArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub max_entries: Option<usize>,
    pub num_samples: Option<usize>,
    pub workers: usize,
    pub redo: bool,
    pub summary: Option<PathBuf>,
}

fn read_convert_options(path: &Path) -> Result<ConvertOptions> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let opts: ConvertOptions = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    opts.isolation.validate()?;
    Ok(opts)
}

pub fn cmd_parse(args: &ParseArgs) -> Result<()> {
    let t0 = Instant::now();
    let mut convert = match &args.config {
        Some(path) => read_convert_options(path)
            .with_context(|| format!("invalid conversion config {}", path.display()))?,
        None => ConvertOptions::default(),
    };
    if args.max_entries.is_some() {
        convert.max_entries = args.max_entries;
    }

    let opts = ParseOptions {
        convert,
        redo: args.redo,
        workers: args.workers,
        num_samples: args.num_samples,
    };
    let report = parse_directory(&args.input, &args.output, &opts)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    tracing::info!(
        stores = report.stores.len(),
        events = report.n_events(),
        skipped = report.skipped.len(),
        elapsed_s = t0.elapsed().as_secs_f64(),
        "parse complete"
    );

    let stores: Vec<serde_json::Value> = report
        .stores
        .iter()
        .map(|s| {
            serde_json::json!({
                "store": s.store_dir.display().to_string(),
                "n_events": s.n_events,
                "converted": s.converted,
            })
        })
        .collect();
    let skipped: Vec<String> = report.skipped.iter().map(|p| p.display().to_string()).collect();
    crate::write_json(
        args.summary.as_ref(),
        serde_json::json!({
            "n_events": report.n_events(),
            "stores": stores,
            "skipped": skipped,
        }),
    )
}
