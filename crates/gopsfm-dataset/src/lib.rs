#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Indexable (camera, frame) sample dataset.
pub mod dataset;

/// Error types for the dataset crate.
pub mod error;

/// Image decode, resize, remap and crop primitives.
pub mod imageops;

/// Calibration parsing of a reconstructed sparse model.
pub mod parser;

/// Undistortion remap construction.
pub mod undistort;

pub use dataset::{Dataset, DatasetConfig, Sample, Split};
pub use error::DatasetError;
pub use parser::{Parser, ParserConfig};
