//! # hep-dataset
//!
//! Turns table stores into labelled, sharded tensor datasets.
//!
//! - [`config`]: which tables and columns become tensors
//! - [`tensorize`]: contiguous row reads and padded per-event tensors
//! - [`sort`]: row ordering inside each event block
//! - [`split`]: train/validation ranges and shard sizing
//! - [`assemble`]: shard jobs over a worker pool
//!
//! ```no_run
//! use hep_dataset::{MakeDatasetsOptions, ValidationSplit, make_datasets};
//!
//! let mut opts = MakeDatasetsOptions::new(
//!     vec!["tables/ttbar".into(), "tables/wjets".into()],
//!     "datasets/v1",
//!     10_000,
//! );
//! opts.validation = ValidationSplit::Fraction(0.2);
//! opts.workers = 4;
//! let report = make_datasets(&opts).unwrap();
//! println!("{} shards", report.plan.jobs.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod config;
pub mod sort;
pub mod split;
pub mod tensorize;

pub use assemble::{
    DatasetPlan, DatasetReport, MakeDatasetsOptions, Partition, ShardJob, SourceIndex,
    build_shard, check_enough_data, make_datasets, plan_datasets,
};
pub use config::{AuxSpec, DatasetLayout, InputSpec};
pub use sort::{SortMetric, SortPlan, SortSpec, sort_rows};
pub use split::{ShardSize, ValidationSplit, set_range_from_splits, splits_from_val};
pub use tensorize::{load_aux, load_events, load_range};
