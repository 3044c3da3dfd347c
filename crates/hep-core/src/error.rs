//! Error types for hepten

use std::path::PathBuf;

use thiserror::Error;

/// hepten error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid split values, duplicate sources, reserved or unknown columns.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A source lacks enough events for the requested range.
    #[error(
        "insufficient data in {}: requested {requested} samples, only {available} available",
        .dir.display()
    )]
    InsufficientData {
        /// Offending source directory.
        dir: PathBuf,
        /// Number of samples requested (including the start offset).
        requested: usize,
        /// Number of samples that could be read.
        available: usize,
    },

    /// A raw record could not be parsed.
    #[error("corrupt source {}: {reason}", .path.display())]
    CorruptSource {
        /// Raw file that failed to decode.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// A table or shard could not be persisted.
    #[error("failed to write {}: {reason}", .path.display())]
    StorageWrite {
        /// Destination that failed.
        path: PathBuf,
        /// Writer message.
        reason: String,
    },

    /// Output directory already holds shards and `force` was not given.
    #[error("directory {} is not empty, use --force to clear it first", .0.display())]
    DestinationNotEmpty(PathBuf),

    /// Source directory missing or empty.
    #[error("no such source directory (or no stores in it): {}", .0.display())]
    MissingSource(PathBuf),

    /// Work was cancelled because another job failed.
    #[error("aborted: another job failed")]
    Aborted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Shorthand for [`Error::CorruptSource`].
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptSource { path: path.into(), reason: reason.to_string() }
    }

    /// Shorthand for [`Error::StorageWrite`].
    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::StorageWrite { path: path.into(), reason: reason.to_string() }
    }

    /// Per-file errors that bulk ingestion logs and skips instead of propagating.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::CorruptSource { .. } | Error::StorageWrite { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(Error::corrupt("a.parquet", "truncated").is_recoverable());
        assert!(Error::write("b.parquet", "disk full").is_recoverable());
        assert!(!Error::Configuration("dup".into()).is_recoverable());
        assert!(!Error::Aborted.is_recoverable());
    }

    #[test]
    fn insufficient_data_message() {
        let e = Error::InsufficientData { dir: "/data/ttbar".into(), requested: 100, available: 80 };
        let msg = e.to_string();
        assert!(msg.contains("/data/ttbar"));
        assert!(msg.contains("100"));
        assert!(msg.contains("80"));
    }
}
