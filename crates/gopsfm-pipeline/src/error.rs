/// Error types for the pipeline crate.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error reading or writing a pipeline file
    #[error("error reading or writing a pipeline file")]
    IoError(#[from] std::io::Error),

    /// Error loading or converting pose bundles
    #[error(transparent)]
    PoseError(#[from] gopsfm_3d::poses::PoseError),

    /// Error reading or writing a sparse model
    #[error(transparent)]
    ColmapError(#[from] gopsfm_3d::io::colmap::ColmapError),

    /// The group-of-pictures size is zero
    #[error("group-of-pictures size must be non-zero")]
    InvalidGopSize,

    /// A required input file or directory is missing
    #[error("required input is missing: {0}")]
    MissingInput(std::path::PathBuf),

    /// An external command exited with a failure status
    #[error("command `{command}` failed with exit code {code:?}")]
    CommandFailed {
        /// The command line that was spawned
        command: String,
        /// The exit code, if the process was not killed by a signal
        code: Option<i32>,
    },
}
