#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Database write contract for the reconstruction seed.
pub mod database;

/// Error types for the pipeline crate.
pub mod error;

/// Video frame extraction through ffmpeg.
pub mod extract;

/// GOP keyframe planning and per-keyframe input staging.
pub mod planner;

/// Camera priors computed from legacy pose bundles.
pub mod priors;

/// Manual-prior project materialization.
pub mod project;

/// Reconstruction driver contract and its colmap CLI binding.
pub mod reconstructor;

pub use error::PipelineError;
