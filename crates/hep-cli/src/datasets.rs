//! `hepten make-datasets`: table stores → labelled shards.

use anyhow::{Context, Result};
use std::path::PathBuf;

use hep_dataset::{
    DatasetLayout, MakeDatasetsOptions, Partition, ShardSize, SortSpec, ValidationSplit,
    make_datasets,
};

pub struct MakeDatasetsArgs {
    pub sources: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub num_samples: usize,
    pub size: String,
    pub workers: usize,
    pub validation_split: String,
    pub sort_on: Option<String>,
    pub ascending: bool,
    pub layout: Option<PathBuf>,
    pub seed: u64,
    pub force: bool,
    pub summary: Option<PathBuf>,
}

pub fn cmd_make_datasets(args: &MakeDatasetsArgs) -> Result<()> {
    let size: ShardSize =
        args.size.parse().with_context(|| format!("bad --size '{}'", args.size))?;
    let validation: ValidationSplit = args
        .validation_split
        .parse()
        .with_context(|| format!("bad --validation-split '{}'", args.validation_split))?;
    let sort = args
        .sort_on
        .as_deref()
        .map(str::parse::<SortSpec>)
        .transpose()
        .context("bad --sort-on")?;
    let layout = match &args.layout {
        Some(path) => DatasetLayout::from_path(path)
            .with_context(|| format!("invalid layout {}", path.display()))?,
        None => DatasetLayout::default(),
    };

    let mut opts =
        MakeDatasetsOptions::new(args.sources.clone(), args.output_dir.clone(), args.num_samples);
    opts.size = size;
    opts.workers = args.workers;
    opts.validation = validation;
    opts.sort = sort;
    opts.ascending = args.ascending;
    opts.layout = layout;
    opts.seed = args.seed;
    opts.force = args.force;

    let report = make_datasets(&opts)
        .with_context(|| format!("failed to build datasets in {}", args.output_dir.display()))?;

    let partition = |p: Partition| {
        let shards: Vec<String> =
            report.plan.shards(p).iter().map(|s| s.display().to_string()).collect();
        serde_json::json!({
            "samples_per_class": report.samples(p),
            "shards": shards,
        })
    };
    crate::write_json(
        args.summary.as_ref(),
        serde_json::json!({
            "classes": report.n_classes,
            "stride": report.plan.stride,
            "train": partition(Partition::Train),
            "val": partition(Partition::Val),
        }),
    )
}
