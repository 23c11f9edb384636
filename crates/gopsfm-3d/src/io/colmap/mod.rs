mod binary;
mod text;
mod types;

pub use binary::{read_cameras_bin, read_images_bin, read_points3d_bin};
pub use text::{
    read_cameras_txt, read_images_txt, read_points3d_txt, write_cameras_txt, write_images_txt,
    write_points3d_txt, ColmapError,
};
pub use types::{CameraModelId, ColmapCamera, ColmapImage, ColmapPoint3d};
