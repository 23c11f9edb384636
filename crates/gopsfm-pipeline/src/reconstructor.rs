use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::error::PipelineError;

/// Contract of the external structure-from-motion tool.
///
/// Each step returns `Ok(())` only on success; the driver aborts the
/// keyframe on the first failure.
pub trait Reconstructor {
    /// Detect features in every staged image and store them in the database.
    fn extract_features(&self, database: &Path, image_dir: &Path) -> Result<(), PipelineError>;

    /// Match features exhaustively across all image pairs.
    fn match_features(&self, database: &Path) -> Result<(), PipelineError>;

    /// Triangulate a sparse model from known poses seeded by the manual model.
    fn triangulate(
        &self,
        database: &Path,
        image_dir: &Path,
        input_model: &Path,
        output_model: &Path,
    ) -> Result<(), PipelineError>;

    /// Undistort images and the sparse model into the COLMAP output layout.
    fn undistort(
        &self,
        image_dir: &Path,
        input_model: &Path,
        output_dir: &Path,
    ) -> Result<(), PipelineError>;
}

/// [`Reconstructor`] backed by the `colmap` command line binary.
#[derive(Debug, Clone)]
pub struct ColmapCli {
    /// Name or path of the binary to spawn.
    pub binary: PathBuf,
}

impl Default for ColmapCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("colmap"),
        }
    }
}

fn run_command(mut command: Command) -> Result<(), PipelineError> {
    let line = format!("{:?}", command);
    log::info!("running {}", line);

    let status = command.status()?;
    if !status.success() {
        return Err(PipelineError::CommandFailed {
            command: line,
            code: status.code(),
        });
    }
    Ok(())
}

impl Reconstructor for ColmapCli {
    fn extract_features(&self, database: &Path, image_dir: &Path) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("feature_extractor")
            .arg("--database_path")
            .arg(database)
            .arg("--image_path")
            .arg(image_dir)
            .args(["--SiftExtraction.max_image_size", "4096"])
            .args(["--SiftExtraction.max_num_features", "106384"])
            .args(["--SiftExtraction.estimate_affine_shape", "1"])
            .args(["--SiftExtraction.domain_size_pooling", "1"])
            .args(["--ImageReader.camera_model", "PINHOLE"]);
        run_command(command)
    }

    fn match_features(&self, database: &Path) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("exhaustive_matcher")
            .arg("--database_path")
            .arg(database);
        run_command(command)
    }

    fn triangulate(
        &self,
        database: &Path,
        image_dir: &Path,
        input_model: &Path,
        output_model: &Path,
    ) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("point_triangulator")
            .arg("--database_path")
            .arg(database)
            .arg("--image_path")
            .arg(image_dir)
            .arg("--output_path")
            .arg(output_model)
            .arg("--input_path")
            .arg(input_model)
            .arg("--Mapper.ba_global_function_tolerance=0.000001");
        run_command(command)
    }

    fn undistort(
        &self,
        image_dir: &Path,
        input_model: &Path,
        output_dir: &Path,
    ) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("image_undistorter")
            .arg("--image_path")
            .arg(image_dir)
            .arg("--input_path")
            .arg(input_model)
            .arg("--output_path")
            .arg(output_dir)
            .args(["--output_type", "COLMAP"]);
        run_command(command)
    }
}

/// Run the full reconstruction of one keyframe project.
///
/// Sequences feature extraction, matching, triangulation from the manual
/// priors and undistortion, then removes the staged `input/` directory and
/// collects the undistorted sparse model under `sparse/0`. No retries, no
/// partial recovery.
pub fn run_reconstruction<R: Reconstructor>(
    reconstructor: &R,
    project_dir: impl AsRef<Path>,
) -> Result<(), PipelineError> {
    let project_dir = project_dir.as_ref();
    if !project_dir.is_dir() {
        return Err(PipelineError::MissingInput(project_dir.to_path_buf()));
    }

    let database = project_dir.join("input.db");
    let input_dir = project_dir.join("input");
    let manual_dir = project_dir.join("manual");
    let distorted_model = project_dir.join("distorted").join("sparse");
    std::fs::create_dir_all(&distorted_model)?;

    reconstructor.extract_features(&database, &input_dir)?;
    reconstructor.match_features(&database)?;
    reconstructor.triangulate(&database, &input_dir, &manual_dir, &distorted_model)?;
    reconstructor.undistort(&input_dir, &distorted_model, project_dir)?;

    std::fs::remove_dir_all(&input_dir)?;

    // the undistorter writes flat into sparse/; downstream expects sparse/0
    let sparse_dir = project_dir.join("sparse");
    let model_dir = sparse_dir.join("0");
    std::fs::create_dir_all(&model_dir)?;
    for entry in std::fs::read_dir(&sparse_dir)? {
        let entry = entry?;
        if entry.file_name() == "0" {
            continue;
        }
        std::fs::rename(entry.path(), model_dir.join(entry.file_name()))?;
    }

    log::info!("reconstruction finished for {}", project_dir.display());
    Ok(())
}
