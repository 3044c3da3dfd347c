//! # hep-io
//!
//! Storage plumbing for hepten. Raw detector records come in as jagged
//! Parquet columns, feature tables go out to a directory-per-file
//! [`TableStore`], and assembled datasets are written as Parquet shards.
//!
//! ```no_run
//! use hep_io::{TableStore, read_raw_events};
//!
//! let events = read_raw_events("run_147.parquet".as_ref()).unwrap();
//! let store = TableStore::open("tables/run_147").unwrap();
//! let jets = store.select("Jet", 0, 100, Some(&["PT", "Eta"])).unwrap();
//! println!("{} raw entries, {} jet rows", hep_core::EventSource::n_entries(&events), jets.n_rows());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod jagged;
pub mod raw_parquet;
pub mod shard;
pub mod store;

pub use frame::Frame;
pub use jagged::JaggedEvents;
pub use raw_parquet::{read_raw_events, write_raw_events};
pub use shard::{AuxBlock, Shard, TensorBlock, read_shard, write_shard};
pub use store::{NUM_VALUES_KEY, TableStore, list_stores};

use parquet::basic::Compression;

pub(crate) fn default_compression() -> Compression {
    Compression::SNAPPY
}
