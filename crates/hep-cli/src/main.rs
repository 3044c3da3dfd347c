//! hepten CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod datasets;
mod inspect;
mod parse;

#[derive(Parser)]
#[command(name = "hepten")]
#[command(about = "hepten - detector records to ML-ready tensor datasets")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a directory of raw event files into per-file table stores
    Parse {
        /// Directory of raw `.parquet` event files
        input: PathBuf,

        /// Output directory (one store per raw file)
        #[arg(short, long)]
        output: PathBuf,

        /// Conversion settings (YAML or JSON): cuts, isolation, max_entries
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only read the first N entries of each raw file
        #[arg(long)]
        max_entries: Option<usize>,

        /// Stop once roughly N events are stored
        #[arg(short = 'n', long)]
        num_samples: Option<usize>,

        /// Concurrent workers
        #[arg(short = 'p', long, default_value = "1")]
        workers: usize,

        /// Reconvert files whose store already exists
        #[arg(long)]
        redo: bool,

        /// Write the run summary here (pretty JSON). Defaults to stdout.
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Build labelled train/validation shards from class directories of stores
    MakeDatasets {
        /// Class directories; order defines the one-hot label
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Output directory (gets `train/` and `val/`)
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Samples per class
        #[arg(short = 'n', long)]
        num_samples: usize,

        /// Samples per shard, or a target size such as `100MB`
        #[arg(short, long, default_value = "1000")]
        size: String,

        /// Concurrent workers
        #[arg(short = 'p', long, default_value = "1")]
        workers: usize,

        /// Validation fraction (< 1) or per-class count
        #[arg(short = 'v', long, default_value = "0.0")]
        validation_split: String,

        /// Row order inside events: `shuffle`, a column, a MaxLep metric, or a comma list
        #[arg(long)]
        sort_on: Option<String>,

        /// Sort ascending (default is descending)
        #[arg(long, conflicts_with = "sort_descending")]
        sort_ascending: bool,

        /// Sort descending
        #[arg(long)]
        sort_descending: bool,

        /// Tensor layout (YAML or JSON). Defaults to the built-in layout.
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Base random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Clear non-empty output partitions first
        #[arg(short, long)]
        force: bool,

        /// Write the run summary here (pretty JSON). Defaults to stdout.
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Print table row counts of a store, or the contents summary of a shard
    Inspect {
        /// Store directory or shard file
        path: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse {
            input,
            output,
            config,
            max_entries,
            num_samples,
            workers,
            redo,
            summary,
        } => parse::cmd_parse(&parse::ParseArgs {
            input,
            output,
            config,
            max_entries,
            num_samples,
            workers,
            redo,
            summary,
        }),
        Commands::MakeDatasets {
            sources,
            output_dir,
            num_samples,
            size,
            workers,
            validation_split,
            sort_on,
            sort_ascending,
            sort_descending: _,
            layout,
            seed,
            force,
            summary,
        } => datasets::cmd_make_datasets(&datasets::MakeDatasetsArgs {
            sources,
            output_dir,
            num_samples,
            size,
            workers,
            validation_split,
            sort_on,
            ascending: sort_ascending,
            layout,
            seed,
            force,
            summary,
        }),
        Commands::Inspect { path, output } => inspect::cmd_inspect(&path, output.as_ref()),
    }
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
