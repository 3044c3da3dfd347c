//! # hep-core
//!
//! Shared foundation for hepten: the error taxonomy, the strongly-typed
//! column registry describing every output table, and the two traits the
//! pipeline depends on from the outside world (raw event access and progress
//! reporting), plus the worker pool shared by ingestion and dataset
//! assembly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod pool;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use pool::{AbortFlag, WorkerPool, round_robin};
pub use traits::{EventSource, Progress};
pub use types::{
    Column, ELECTRON_MASS, EventColumn, ISOLATION_PAIRS, MUON_MASS, ObjectKind, TableKey,
    field_name,
};
