use crate::error::PipelineError;

/// Write access to the reconstruction seed database.
///
/// The on-disk database is owned by the external reconstruction tool; this
/// trait only covers the rows the pipeline seeds before triangulation. Ids
/// are 1-based, matching the staged image names and manual model files.
pub trait DatabaseWriter {
    /// Add a camera row and return its id.
    fn add_camera(
        &mut self,
        model_id: i32,
        width: u32,
        height: u32,
        params: &[f64],
    ) -> Result<u32, PipelineError>;

    /// Add an image row with its pose prior and return its id.
    fn add_image(
        &mut self,
        name: &str,
        camera_id: u32,
        prior_q: [f64; 4],
        prior_t: [f64; 3],
        image_id: u32,
    ) -> Result<u32, PipelineError>;
}

/// A camera row recorded by [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRecord {
    /// Camera id.
    pub camera_id: u32,
    /// Camera model code.
    pub model_id: i32,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Model parameters.
    pub params: Vec<f64>,
}

/// An image row recorded by [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Image id.
    pub image_id: u32,
    /// Image name.
    pub name: String,
    /// Camera id.
    pub camera_id: u32,
    /// Pose prior quaternion, scalar first.
    pub prior_q: [f64; 4],
    /// Pose prior translation.
    pub prior_t: [f64; 3],
}

/// In-memory [`DatabaseWriter`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    /// Recorded camera rows, in insertion order.
    pub cameras: Vec<CameraRecord>,
    /// Recorded image rows, in insertion order.
    pub images: Vec<ImageRecord>,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatabaseWriter for MemoryDatabase {
    fn add_camera(
        &mut self,
        model_id: i32,
        width: u32,
        height: u32,
        params: &[f64],
    ) -> Result<u32, PipelineError> {
        let camera_id = self.cameras.len() as u32 + 1;
        self.cameras.push(CameraRecord {
            camera_id,
            model_id,
            width,
            height,
            params: params.to_vec(),
        });
        Ok(camera_id)
    }

    fn add_image(
        &mut self,
        name: &str,
        camera_id: u32,
        prior_q: [f64; 4],
        prior_t: [f64; 3],
        image_id: u32,
    ) -> Result<u32, PipelineError> {
        self.images.push(ImageRecord {
            image_id,
            name: name.to_string(),
            camera_id,
            prior_q,
            prior_t,
        });
        Ok(image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_ids_are_one_based() -> Result<(), PipelineError> {
        let mut db = MemoryDatabase::new();
        let first = db.add_camera(1, 640, 480, &[500.0, 500.0, 320.0, 240.0])?;
        let second = db.add_camera(1, 640, 480, &[500.0, 500.0, 320.0, 240.0])?;
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(db.cameras[0].camera_id, 1);
        Ok(())
    }

    #[test]
    fn image_rows_keep_the_explicit_id() -> Result<(), PipelineError> {
        let mut db = MemoryDatabase::new();
        let id = db.add_image("cam00.png", 1, [1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1)?;
        assert_eq!(id, 1);
        assert_eq!(db.images[0].name, "cam00.png");
        assert_eq!(db.images[0].camera_id, 1);
        Ok(())
    }
}
