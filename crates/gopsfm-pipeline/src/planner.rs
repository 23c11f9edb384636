use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// The per-keyframe project directory, `colmap_<keyframe>` under the scene.
pub fn project_dir(scene_dir: impl AsRef<Path>, keyframe: usize) -> PathBuf {
    scene_dir.as_ref().join(format!("colmap_{}", keyframe))
}

/// Keyframe indices of a GOP segmentation.
///
/// One keyframe opens each group of pictures: `start`, `start + gop`, ...
/// up to (excluding) `end`. An empty frame range yields no keyframes; a
/// zero group size is a configuration error.
pub fn keyframes(start: usize, end: usize, gop: usize) -> Result<Vec<usize>, PipelineError> {
    if gop == 0 {
        return Err(PipelineError::InvalidGopSize);
    }
    let num_groups = end.saturating_sub(start).div_ceil(gop);
    Ok((0..num_groups).map(|k| start + k * gop).collect())
}

/// Immediate subdirectories of the extracted-frames directory, sorted.
///
/// The lexicographic order of the directory names defines the global camera
/// ordering for the whole pipeline; every staged image name and database row
/// follows it.
pub fn camera_dirs(png_dir: impl AsRef<Path>) -> Result<Vec<String>, PipelineError> {
    let png_dir = png_dir.as_ref();
    if !png_dir.is_dir() {
        return Err(PipelineError::MissingInput(png_dir.to_path_buf()));
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(png_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Stage the keyframe image of every camera into the project input directory.
///
/// Copies `png/<cam>/{keyframe+1:05}.png` (frames are numbered from 1 on
/// disk) to `colmap_<keyframe>/input/cam{index:02}.png`, with `index` the
/// position of the camera directory in sorted order. A missing source frame
/// is fatal.
pub fn stage_keyframe_inputs(
    scene_dir: impl AsRef<Path>,
    keyframe: usize,
) -> Result<PathBuf, PipelineError> {
    let scene_dir = scene_dir.as_ref();
    let png_dir = scene_dir.join("png");
    let cameras = camera_dirs(&png_dir)?;

    let input_dir = project_dir(scene_dir, keyframe).join("input");
    std::fs::create_dir_all(&input_dir)?;

    for (index, camera) in cameras.iter().enumerate() {
        let source = png_dir
            .join(camera)
            .join(format!("{:05}.png", keyframe + 1));
        if !source.is_file() {
            return Err(PipelineError::MissingInput(source));
        }
        let target = input_dir.join(format!("cam{:02}.png", index));
        std::fs::copy(&source, &target)?;
    }

    log::info!(
        "staged {} keyframe images into {}",
        cameras.len(),
        input_dir.display()
    );
    Ok(input_dir)
}
