#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// I/O utilities for reading and writing COLMAP sparse models.
pub mod io;

/// Rig normalization into a canonical world frame.
pub mod normalize;

/// Legacy multi-view pose bundles and their conversion to world-to-camera.
pub mod poses;

/// Rotation and quaternion transforms.
pub mod transforms;
