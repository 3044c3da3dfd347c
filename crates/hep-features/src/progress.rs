//! Progress reporters for long scans.

use std::time::{Duration, Instant};

use hep_core::Progress;

/// Default interval between progress lines.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Reports progress as `tracing` events, at most once per interval.
#[derive(Debug)]
pub struct LogProgress {
    interval: Duration,
    label: String,
    total: usize,
    last_time: Instant,
    last_done: usize,
}

impl LogProgress {
    /// Reporter with the default 250 ms interval.
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_INTERVAL)
    }

    /// Reporter emitting at most one line per `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval, label: String::new(), total: 0, last_time: Instant::now(), last_done: 0 }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for LogProgress {
    fn start(&mut self, label: &str, total: usize) {
        self.label = label.to_string();
        self.total = total;
        self.last_time = Instant::now();
        self.last_done = 0;
    }

    fn advance(&mut self, done: usize) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_time);
        if dt < self.interval {
            return;
        }
        let rate = (done.saturating_sub(self.last_done)) as f64 / dt.as_secs_f64();
        let pct = if self.total > 0 { 100.0 * done as f64 / self.total as f64 } else { 100.0 };
        tracing::info!(
            scan = %self.label,
            done,
            total = self.total,
            "{pct:5.1}% ({rate:.0} entries/s)"
        );
        self.last_time = now;
        self.last_done = done;
    }

    fn finish(&mut self) {
        tracing::debug!(scan = %self.label, total = self.total, "scan finished");
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _label: &str, _total: usize) {}
    fn advance(&mut self, _done: usize) {}
    fn finish(&mut self) {}
}
