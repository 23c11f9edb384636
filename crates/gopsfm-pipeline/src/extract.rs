use std::{path::Path, process::Command};

use crate::error::PipelineError;

/// List the `*.mp4` files of a scene directory, sorted by name.
///
/// The sorted order assigns the camera indices, so it must match the order
/// used for the pose bundles.
pub fn video_files(scene_dir: impl AsRef<Path>) -> Result<Vec<std::path::PathBuf>, PipelineError> {
    let scene_dir = scene_dir.as_ref();
    if !scene_dir.is_dir() {
        return Err(PipelineError::MissingInput(scene_dir.to_path_buf()));
    }

    let mut videos = Vec::new();
    for entry in std::fs::read_dir(scene_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "mp4") {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}

/// Extract PNG frames from every video of a scene through ffmpeg.
///
/// Video `idx` (in sorted order) decodes into `png/cam{idx:02}/%05d.png`,
/// numbered from 1 by ffmpeg. A non-zero exit status is fatal.
pub fn extract_frames(
    scene_dir: impl AsRef<Path>,
    frame_rate: u32,
) -> Result<(), PipelineError> {
    let scene_dir = scene_dir.as_ref();
    let png_dir = scene_dir.join("png");

    for (idx, video) in video_files(scene_dir)?.iter().enumerate() {
        let camera_dir = png_dir.join(format!("cam{:02}", idx));
        std::fs::create_dir_all(&camera_dir)?;

        let mut command = Command::new("ffmpeg");
        command
            .arg("-i")
            .arg(video)
            .args(["-vf", &format!("fps={}", frame_rate)])
            .arg(camera_dir.join("%05d.png"));

        let line = format!("{:?}", command);
        log::info!("running {}", line);
        let status = command.status()?;
        if !status.success() {
            return Err(PipelineError::CommandFailed {
                command: line,
                code: status.code(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_files_are_sorted_and_filtered() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        for name in ["cam_b.mp4", "cam_a.mp4", "notes.txt"] {
            std::fs::write(tmp.path().join(name), b"")?;
        }

        let videos = video_files(tmp.path())?;
        let names = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["cam_a.mp4", "cam_b.mp4"]);
        Ok(())
    }

    #[test]
    fn a_missing_scene_directory_is_fatal() {
        let result = video_files("/definitely/not/a/scene");
        assert!(matches!(result, Err(PipelineError::MissingInput(_))));
    }
}
