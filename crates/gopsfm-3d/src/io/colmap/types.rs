/// Represents a COLMAP camera model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModelId {
    /// Simple pinhole camera model
    SimplePinhole = 0,
    /// Pinhole camera model
    Pinhole = 1,
    /// Simple radial camera model
    SimpleRadial = 2,
    /// Radial camera model
    Radial = 3,
    /// OpenCV camera model
    OpenCv = 4,
    /// OpenCV fisheye camera model
    OpenCvFisheye = 5,
    /// Full OpenCV camera model
    FullOpenCv = 6,
    /// Field of view camera model
    Fov = 7,
    /// Simple radial fisheye camera model
    SimpleRadialFisheye = 8,
    /// Radial fisheye camera model
    RadialFisheye = 9,
    /// Thin prism fisheye camera model
    ThinPrismFisheye = 10,
}

impl CameraModelId {
    /// Parse a model from its integer code as stored in the binary format.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::SimplePinhole,
            1 => Self::Pinhole,
            2 => Self::SimpleRadial,
            3 => Self::Radial,
            4 => Self::OpenCv,
            5 => Self::OpenCvFisheye,
            6 => Self::FullOpenCv,
            7 => Self::Fov,
            8 => Self::SimpleRadialFisheye,
            9 => Self::RadialFisheye,
            10 => Self::ThinPrismFisheye,
            _ => return None,
        })
    }

    /// Parse a model from its text tag as stored in `cameras.txt`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "SIMPLE_PINHOLE" => Self::SimplePinhole,
            "PINHOLE" => Self::Pinhole,
            "SIMPLE_RADIAL" => Self::SimpleRadial,
            "RADIAL" => Self::Radial,
            "OPENCV" => Self::OpenCv,
            "OPENCV_FISHEYE" => Self::OpenCvFisheye,
            "FULL_OPENCV" => Self::FullOpenCv,
            "FOV" => Self::Fov,
            "SIMPLE_RADIAL_FISHEYE" => Self::SimpleRadialFisheye,
            "RADIAL_FISHEYE" => Self::RadialFisheye,
            "THIN_PRISM_FISHEYE" => Self::ThinPrismFisheye,
            _ => return None,
        })
    }

    /// The text tag of the model.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SimplePinhole => "SIMPLE_PINHOLE",
            Self::Pinhole => "PINHOLE",
            Self::SimpleRadial => "SIMPLE_RADIAL",
            Self::Radial => "RADIAL",
            Self::OpenCv => "OPENCV",
            Self::OpenCvFisheye => "OPENCV_FISHEYE",
            Self::FullOpenCv => "FULL_OPENCV",
            Self::Fov => "FOV",
            Self::SimpleRadialFisheye => "SIMPLE_RADIAL_FISHEYE",
            Self::RadialFisheye => "RADIAL_FISHEYE",
            Self::ThinPrismFisheye => "THIN_PRISM_FISHEYE",
        }
    }

    /// Number of parameters of the model.
    pub fn num_params(&self) -> usize {
        match self {
            Self::SimplePinhole => 3,
            Self::Pinhole => 4,
            Self::SimpleRadial => 4,
            Self::Radial => 5,
            Self::OpenCv => 8,
            Self::OpenCvFisheye => 8,
            Self::FullOpenCv => 12,
            Self::Fov => 5,
            Self::SimpleRadialFisheye => 4,
            Self::RadialFisheye => 5,
            Self::ThinPrismFisheye => 12,
        }
    }
}

/// Represents a camera of a COLMAP sparse model.
#[derive(Debug, Clone)]
pub struct ColmapCamera {
    /// Camera id
    pub camera_id: u32,
    /// Camera model id
    pub model_id: CameraModelId,
    /// Image width
    pub width: usize,
    /// Image height
    pub height: usize,
    /// Camera parameters, model dependent
    pub params: Vec<f64>,
}

/// Represents an image of a COLMAP sparse model.
#[derive(Debug, Clone)]
pub struct ColmapImage {
    /// Image name
    pub name: String,
    /// Image id
    pub image_id: u32,
    /// Camera id
    pub camera_id: u32,
    /// Rotation quaternion, scalar first (qw, qx, qy, qz)
    pub rotation: [f64; 4],
    /// Translation (x, y, z)
    pub translation: [f64; 3],
    /// Observed 2d points as (x, y, point3d_id); -1 marks no 3d point
    pub points2d: Vec<(f64, f64, i64)>,
}

/// Represents a 3D point of a COLMAP sparse model.
#[derive(Debug, Clone)]
pub struct ColmapPoint3d {
    /// Point3d id
    pub point3d_id: u64,
    /// x, y, z coordinates
    pub xyz: [f64; 3],
    /// rgb color
    pub rgb: [u8; 3],
    /// Reprojection error
    pub error: f64,
    /// Track as (image_id, point2d_idx) pairs
    pub track: Vec<(u32, u32)>,
}
