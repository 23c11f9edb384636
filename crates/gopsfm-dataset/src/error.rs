/// Error types for the dataset crate.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Error reading a dataset file
    #[error("error reading a dataset file")]
    IoError(#[from] std::io::Error),

    /// Error decoding an image
    #[error("error decoding an image")]
    ImageError(#[from] image::ImageError),

    /// Error reading the sparse model
    #[error(transparent)]
    ColmapError(#[from] gopsfm_3d::io::colmap::ColmapError),

    /// Error reading the pose bounds file
    #[error(transparent)]
    PoseError(#[from] gopsfm_3d::poses::PoseError),

    /// Error parsing the extended metadata
    #[error("error parsing the extended metadata")]
    JsonError(#[from] serde_json::Error),

    /// No sparse model directory was found
    #[error("sparse model directory does not exist under {0}")]
    ColmapDirNotFound(std::path::PathBuf),

    /// The sparse model holds no images
    #[error("no images found in the sparse model")]
    NoImages,

    /// A camera model without a supported distortion classification
    #[error("unsupported camera model {0}, only perspective and fisheye cameras are supported")]
    UnsupportedCameraModel(String),

    /// An image references a camera the model does not define
    #[error("image references missing camera {0}")]
    MissingCamera(u32),

    /// A world-to-camera matrix could not be inverted
    #[error("pose of image `{0}` is not invertible")]
    SingularPose(String),

    /// The fisheye undistortion maps have no in-bounds source pixel
    #[error("undistortion of camera {0} produced an empty region of interest")]
    EmptyUndistortionRoi(u32),

    /// The frame directories do not line up with the reconstructed images
    #[error("{images} reconstructed images but {directories} camera frame directories")]
    CameraCountMismatch {
        /// Images in the sparse model.
        images: usize,
        /// Camera directories under `png/`.
        directories: usize,
    },

    /// A sample index past the end of the dataset
    #[error("sample index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The dataset length.
        len: usize,
    },
}
