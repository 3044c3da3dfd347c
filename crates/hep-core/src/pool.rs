//! Fixed-size worker pool for shared-nothing batch jobs.
//!
//! Jobs are split round-robin into one partition per worker exactly once
//! (`jobs[i::n]`). Partitions `1..n` run on a dedicated rayon pool while
//! partition `0` runs on the calling thread. A shared abort flag is raised by
//! the first failing partition; the others observe it before their next job
//! and stop. The first error is returned once every partition has joined.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

/// Cancellation flag shared by all partitions of one run.
#[derive(Debug, Default)]
pub struct AbortFlag(AtomicBool);

impl AbortFlag {
    /// Ask every partition to stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Aborted)` once raised.
    pub fn check(&self) -> Result<()> {
        if self.is_raised() { Err(Error::Aborted) } else { Ok(()) }
    }
}

/// Split `jobs` into `n` round-robin partitions.
pub fn round_robin<J>(jobs: Vec<J>, n: usize) -> Vec<Vec<J>> {
    let n = n.max(1);
    let mut parts: Vec<Vec<J>> = (0..n).map(|_| Vec::new()).collect();
    for (i, job) in jobs.into_iter().enumerate() {
        parts[i % n].push(job);
    }
    parts
}

/// Worker pool with `workers` concurrent partitions (the caller counts as one).
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` partitions (at least 1).
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1) }
    }

    /// Number of partitions.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` once per partition.
    ///
    /// `work(partition_index, jobs, abort)` owns its partition's jobs and is
    /// expected to call [`AbortFlag::check`] between jobs.
    pub fn run_partitions<J, F>(&self, jobs: Vec<J>, work: F) -> Result<()>
    where
        J: Send,
        F: Fn(usize, Vec<J>, &AbortFlag) -> Result<()> + Sync,
    {
        let mut parts = round_robin(jobs, self.workers).into_iter();
        let local = parts.next().unwrap_or_default();
        let abort = AbortFlag::default();
        let first_err: Mutex<Option<Error>> = Mutex::new(None);

        let record = |res: Result<()>| {
            if let Err(e) = res {
                abort.raise();
                let mut slot = first_err.lock().unwrap_or_else(|p| p.into_inner());
                // A partition that stopped because of the flag is not the cause.
                if slot.is_none() || matches!(*slot, Some(Error::Aborted)) {
                    *slot = Some(e);
                }
            }
        };

        if self.workers == 1 {
            record(work(0, local, &abort));
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers - 1)
                .thread_name(|i| format!("hepten-worker-{}", i + 1))
                .build()
                .map_err(|e| Error::Validation(format!("failed to create thread pool: {e}")))?;
            pool.in_place_scope(|s| {
                for (i, part) in parts.enumerate() {
                    let (work, record, abort) = (&work, &record, &abort);
                    s.spawn(move |_| {
                        tracing::debug!(partition = i + 1, "worker started");
                        record(work(i + 1, part, abort));
                    });
                }
                record(work(0, local, &abort));
            });
        }

        match first_err.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run `work` for every job, checking the abort flag before each one.
    pub fn run_each<J, F>(&self, jobs: Vec<J>, work: F) -> Result<()>
    where
        J: Send,
        F: Fn(J) -> Result<()> + Sync,
    {
        self.run_partitions(jobs, |_, part, abort| {
            for job in part {
                abort.check()?;
                work(job)?;
            }
            Ok(())
        })
    }
}
