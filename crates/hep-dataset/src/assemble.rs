//! Sharded train/validation dataset assembly.
//!
//! Every source directory is one class and holds table stores. Each class
//! contributes the same contiguous range of events to every shard window;
//! classes are mixed only by the single shuffle applied to each shard.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use ndarray::{Array2, Array3, Axis, concatenate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use hep_core::{Error, Result, WorkerPool};
use hep_io::{AuxBlock, Shard, TableStore, TensorBlock, list_stores, write_shard};

use crate::config::DatasetLayout;
use crate::sort::SortSpec;
use crate::split::{
    ShardSize, ValidationSplit, set_range_from_splits, shard_digits, splits_from_val, windows,
};
use crate::tensorize::{load_aux, load_events};

/// Extension of shard files.
pub const SHARD_EXTENSION: &str = "parquet";

/// Settings of one [`make_datasets`] run.
#[derive(Debug, Clone)]
pub struct MakeDatasetsOptions {
    /// Class directories; the i-th one is labelled with the i-th unit vector.
    pub sources: Vec<PathBuf>,
    /// Destination; shards go to `train/` and `val/` below it.
    pub output_dir: PathBuf,
    /// Samples per class over both partitions.
    pub num_samples: usize,
    /// Shard size.
    pub size: ShardSize,
    /// Concurrent workers (the calling thread counts as one).
    pub workers: usize,
    /// Row order inside every event block.
    pub sort: Option<SortSpec>,
    /// Sort direction.
    pub ascending: bool,
    /// Validation share.
    pub validation: ValidationSplit,
    /// Clear existing partition directories first.
    pub force: bool,
    /// Base seed; shard `i` uses `seed + i`.
    pub seed: u64,
    /// Tensor inputs.
    pub layout: DatasetLayout,
}

impl MakeDatasetsOptions {
    /// Options with the default layout, 1000-sample shards, no validation split.
    pub fn new(sources: Vec<PathBuf>, output_dir: impl Into<PathBuf>, num_samples: usize) -> Self {
        Self {
            sources,
            output_dir: output_dir.into(),
            num_samples,
            size: ShardSize::default(),
            workers: 1,
            sort: None,
            ascending: false,
            validation: ValidationSplit::None,
            force: false,
            seed: 42,
            layout: DatasetLayout::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.num_samples == 0 {
            return Err(Error::Configuration("num_samples must be positive".into()));
        }
        if self.sources.is_empty() {
            return Err(Error::Configuration("no source directories given".into()));
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            let canonical = s.canonicalize().unwrap_or_else(|_| s.clone());
            if !seen.insert(canonical) {
                return Err(Error::Configuration(format!(
                    "duplicate source directory {}",
                    s.display()
                )));
            }
        }
        self.layout.validate()
    }
}

/// Stores of one class directory with their event counts.
#[derive(Debug, Clone)]
pub struct SourceIndex {
    dir: PathBuf,
    stores: Vec<(TableStore, usize)>,
}

impl SourceIndex {
    /// List the stores under `dir`.
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::MissingSource(dir.to_path_buf()));
        }
        let paths = list_stores(dir)?;
        if paths.is_empty() {
            return Err(Error::MissingSource(dir.to_path_buf()));
        }
        let mut stores = Vec::with_capacity(paths.len());
        for p in paths {
            let store = TableStore::open(&p)?;
            let n = store.n_events()?;
            stores.push((store, n));
        }
        Ok(Self { dir: dir.to_path_buf(), stores })
    }

    /// Source directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Events over all stores.
    pub fn available(&self) -> usize {
        self.stores.iter().map(|(_, n)| n).sum()
    }
}

/// Fail unless every source holds at least `num_samples` events.
pub fn check_enough_data(sources: &[SourceIndex], num_samples: usize) -> Result<()> {
    for s in sources {
        let available = s.available();
        if available < num_samples {
            return Err(Error::InsufficientData {
                dir: s.dir.clone(),
                requested: num_samples,
                available,
            });
        }
    }
    Ok(())
}

/// Dataset partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Training shards.
    Train,
    /// Validation shards.
    Val,
}

impl Partition {
    /// Directory name under the output directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Val => "val",
        }
    }
}

/// One shard to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardJob {
    /// Position among all jobs of the run; seeds the shard's RNG.
    pub id: usize,
    /// Partition the shard belongs to.
    pub partition: Partition,
    /// Index within the partition (file name).
    pub index: usize,
    /// First per-class event of the window.
    pub start: usize,
    /// Events per class in the window.
    pub samples_per_class: usize,
    /// Shard file.
    pub dest: PathBuf,
}

/// Contiguous per-class range of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    /// Partition.
    pub partition: Partition,
    /// First per-class event.
    pub start: usize,
    /// Events per class.
    pub n_samples: usize,
    /// Shard directory.
    pub dir: PathBuf,
}

/// Everything [`make_datasets`] will write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPlan {
    /// Per-class events per shard.
    pub stride: usize,
    /// Partitions, train first.
    pub partitions: Vec<PartitionPlan>,
    /// Shard jobs, partition by partition.
    pub jobs: Vec<ShardJob>,
}

impl DatasetPlan {
    /// Shard files of `partition`.
    pub fn shards(&self, partition: Partition) -> Vec<&Path> {
        self.jobs.iter().filter(|j| j.partition == partition).map(|j| j.dest.as_path()).collect()
    }
}

/// Compute partitions and shard jobs without touching the filesystem.
pub fn plan_datasets(opts: &MakeDatasetsOptions) -> Result<DatasetPlan> {
    let stride = opts.size.stride(&opts.layout);
    let ranges = set_range_from_splits(
        &splits_from_val(opts.validation, opts.num_samples),
        opts.num_samples,
    )?;

    let mut partitions = Vec::with_capacity(ranges.len());
    let mut jobs = Vec::new();
    for (i, (start, n)) in ranges.into_iter().enumerate() {
        let partition = if i == 0 { Partition::Train } else { Partition::Val };
        let dir = opts.output_dir.join(partition.dir_name());
        let digits = shard_digits(n, stride);
        for (index, (w_start, w_len)) in windows(start, n, stride).enumerate() {
            jobs.push(ShardJob {
                id: jobs.len(),
                partition,
                index,
                start: w_start,
                samples_per_class: w_len,
                dest: dir.join(format!("{index:0digits$}.{SHARD_EXTENSION}")),
            });
        }
        partitions.push(PartitionPlan { partition, start, n_samples: n, dir });
    }
    Ok(DatasetPlan { stride, partitions, jobs })
}

fn has_shards(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(SHARD_EXTENSION) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn prepare_dir(dir: &Path, force: bool) -> Result<()> {
    if force && dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| Error::write(dir, e))?;
        tracing::info!(dir = %dir.display(), "cleared");
    }
    if has_shards(dir)? {
        return Err(Error::DestinationNotEmpty(dir.to_path_buf()));
    }
    std::fs::create_dir_all(dir).map_err(|e| Error::write(dir, e))
}

/// Read `job`'s window from every class and assemble the shuffled shard.
pub fn build_shard(sources: &[SourceIndex], job: &ShardJob, opts: &MakeDatasetsOptions) -> Result<Shard> {
    let layout = &opts.layout;
    let n_classes = sources.len();
    let per_class = job.samples_per_class;
    let mut rng = StdRng::seed_from_u64(opts.seed.wrapping_add(job.id as u64));

    let mut inputs: Vec<Vec<Array3<f64>>> = vec![Vec::new(); layout.inputs.len()];
    let mut aux: Vec<Array2<f64>> = Vec::new();
    for src in sources {
        let mut location = 0usize;
        let mut read = 0usize;
        for (store, n_events) in &src.stores {
            if read == per_class {
                break;
            }
            if *n_events == 0 {
                tracing::debug!(store = %store.path().display(), "skipping empty store");
                continue;
            }
            if location + n_events <= job.start {
                location += n_events;
                continue;
            }
            let first = job.start.saturating_sub(location);
            let n = (per_class - read).min(n_events - first);
            for (slot, input) in inputs.iter_mut().zip(&layout.inputs) {
                slot.push(load_events(store, input, first, n, opts.sort.as_ref(), opts.ascending, &mut rng)?);
            }
            if let Some(a) = &layout.aux {
                aux.push(load_aux(store, a, first, n)?);
            }
            location += n_events;
            read += n;
        }
        if read != per_class {
            return Err(Error::InsufficientData {
                dir: src.dir.clone(),
                requested: job.start + per_class,
                available: src.available(),
            });
        }
    }

    let total = n_classes * per_class;
    let mut labels = Array2::<f64>::zeros((total, n_classes));
    for class in 0..n_classes {
        labels.slice_mut(ndarray::s![class * per_class..(class + 1) * per_class, class]).fill(1.0);
    }

    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(&mut rng);

    let concat_err = |e: ndarray::ShapeError| Error::Validation(format!("cannot stack shard blocks: {e}"));
    let mut blocks = Vec::with_capacity(inputs.len());
    for (parts, input) in inputs.iter().zip(&layout.inputs) {
        let views: Vec<_> = parts.iter().map(|a| a.view()).collect();
        let data = concatenate(Axis(0), &views).map_err(concat_err)?;
        blocks.push(TensorBlock {
            name: input.key.clone(),
            columns: input.columns.clone(),
            data: data.select(Axis(0), &order),
        });
    }
    let aux = match &layout.aux {
        Some(a) => {
            let views: Vec<_> = aux.iter().map(|x| x.view()).collect();
            let data = concatenate(Axis(0), &views).map_err(concat_err)?;
            Some(AuxBlock { columns: a.columns.clone(), data: data.select(Axis(0), &order) })
        }
        None => None,
    };

    Ok(Shard { inputs: blocks, labels: labels.select(Axis(0), &order), aux })
}

/// Outcome of [`make_datasets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    /// What was written.
    pub plan: DatasetPlan,
    /// Number of classes.
    pub n_classes: usize,
}

impl DatasetReport {
    /// Samples per class in `partition`.
    pub fn samples(&self, partition: Partition) -> usize {
        self.plan.partitions.iter().filter(|p| p.partition == partition).map(|p| p.n_samples).sum()
    }
}

/// Build train/validation shards from class directories of table stores.
///
/// Sources, sample counts and destinations are all checked before the first
/// shard is written. A failing job stops the remaining ones; shards that were
/// already written are left in place.
pub fn make_datasets(opts: &MakeDatasetsOptions) -> Result<DatasetReport> {
    let t0 = Instant::now();
    opts.validate()?;
    let sources =
        opts.sources.iter().map(|s| SourceIndex::scan(s)).collect::<Result<Vec<_>>>()?;
    check_enough_data(&sources, opts.num_samples)?;

    let plan = plan_datasets(opts)?;
    std::fs::create_dir_all(&opts.output_dir).map_err(|e| Error::write(&opts.output_dir, e))?;
    for p in &plan.partitions {
        prepare_dir(&p.dir, opts.force)?;
    }
    tracing::info!(
        classes = sources.len(),
        num_samples = opts.num_samples,
        stride = plan.stride,
        shards = plan.jobs.len(),
        workers = opts.workers,
        "assembling datasets"
    );

    let n_jobs = plan.jobs.len();
    let done = AtomicUsize::new(0);
    WorkerPool::new(opts.workers).run_each(plan.jobs.clone(), |job| {
        let shard = build_shard(&sources, &job, opts)?;
        write_shard(&job.dest, &shard)?;
        let k = done.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            partition = job.partition.dir_name(),
            samples = shard.n_samples(),
            "done {k}/{n_jobs}: {}",
            job.dest.display()
        );
        Ok(())
    })?;

    tracing::info!(elapsed_s = t0.elapsed().as_secs_f64(), "datasets complete");
    Ok(DatasetReport { plan, n_classes: sources.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(n: usize, v: ValidationSplit, size: ShardSize) -> MakeDatasetsOptions {
        let mut o = MakeDatasetsOptions::new(vec![PathBuf::from("a")], "/data/out", n);
        o.validation = v;
        o.size = size;
        o
    }

    #[test]
    fn plan_covers_both_partitions() {
        let plan = plan_datasets(&opts(100, ValidationSplit::Fraction(0.2), ShardSize::Samples(30)))
            .unwrap();
        assert_eq!(plan.stride, 30);
        let windows: Vec<(Partition, usize, usize)> =
            plan.jobs.iter().map(|j| (j.partition, j.start, j.samples_per_class)).collect();
        assert_eq!(
            windows,
            vec![
                (Partition::Train, 0, 30),
                (Partition::Train, 30, 30),
                (Partition::Train, 60, 20),
                (Partition::Val, 80, 20),
            ]
        );
        assert_eq!(plan.jobs[3].dest, PathBuf::from("/data/out/val/000.parquet"));
        assert_eq!(plan.jobs[2].dest, PathBuf::from("/data/out/train/002.parquet"));
        assert_eq!(plan.jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn no_validation_means_train_only() {
        let plan = plan_datasets(&opts(10, ValidationSplit::None, ShardSize::Samples(1000))).unwrap();
        assert_eq!(plan.partitions.len(), 1);
        assert_eq!(plan.shards(Partition::Train).len(), 1);
        assert!(plan.shards(Partition::Val).is_empty());
    }

    #[test]
    fn rejects_duplicate_sources() {
        let mut o = opts(10, ValidationSplit::None, ShardSize::Samples(5));
        o.sources = vec![PathBuf::from("/data/x"), PathBuf::from("/data/x")];
        assert!(matches!(o.validate(), Err(Error::Configuration(_))));
        o.sources.pop();
        o.num_samples = 0;
        assert!(matches!(o.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn missing_source_is_reported() {
        let err = SourceIndex::scan(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::MissingSource(_)));
    }
}
