//! # hep-features
//!
//! Turns raw detector records into flat feature tables.
//!
//! - [`geometry`]: wrapped (η, φ) distances and nearest matching
//! - [`isolation`]: cone isolation sums
//! - [`kinematics`]: four-vectors and lepton/MET-relative features
//! - [`reduction`]: event selection and event-level aggregates
//! - [`builder`]: count pass + fill pass over an [`hep_core::EventSource`]
//! - [`dedup`]: removal of tracks claimed by leptons
//! - [`ingest`]: raw files → table stores, optionally in parallel
//!
//! ```no_run
//! use hep_features::{ConvertOptions, NoProgress, convert};
//!
//! let events = hep_io::read_raw_events("ttbar_147.parquet".as_ref()).unwrap();
//! let out = convert(&events, &ConvertOptions::default(), &mut NoProgress).unwrap();
//! out.summary.log();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod dedup;
pub mod geometry;
pub mod ingest;
pub mod isolation;
pub mod kinematics;
pub mod progress;
pub mod reduction;
pub mod table;

pub use builder::{
    ConversionOutput, ConversionSummary, ConvertOptions, FeatureTables, ObjectCounts, convert,
    count_pass, fill_pass,
};
pub use dedup::{Omissions, remove_matched_tracks};
pub use geometry::{DistanceMatrix, delta_r_sq, nearest_match, wrap_phi};
pub use ingest::{ParseOptions, ParseReport, StoredFile, parse_directory, store_file};
pub use isolation::{IsolationConfig, isolation, self_isolation};
pub use kinematics::{FourVector, Reference, RelativeFeatures};
pub use progress::{LogProgress, NoProgress};
pub use reduction::SelectionCuts;
pub use table::{ObjectTable, PerKind};
