use std::path::Path;

use gopsfm_3d::io::colmap::{
    write_cameras_txt, write_images_txt, write_points3d_txt, CameraModelId, ColmapCamera,
    ColmapImage,
};
use gopsfm_3d::poses::read_poses_bounds;

use crate::database::DatabaseWriter;
use crate::error::PipelineError;
use crate::planner::{keyframes, project_dir, stage_keyframe_inputs};
use crate::priors::{convert_pose_bundles, CameraPrior};
use crate::reconstructor::{run_reconstruction, Reconstructor};

/// COLMAP model code of the PINHOLE camera.
const PINHOLE_MODEL_CODE: i32 = 1;

fn pinhole_params(prior: &CameraPrior) -> [f64; 4] {
    [
        prior.focal,
        prior.focal,
        (prior.width / 2.0).floor(),
        (prior.height / 2.0).floor(),
    ]
}

/// Write the manual model seed (`manual/{images,cameras,points3D}.txt`).
///
/// Every prior becomes one PINHOLE camera line and one image record with an
/// empty points line; `points3D.txt` stays empty. The triangulator reads
/// these as the fixed poses.
pub fn write_manual_project(
    project_dir: impl AsRef<Path>,
    priors: &[CameraPrior],
) -> Result<(), PipelineError> {
    let manual_dir = project_dir.as_ref().join("manual");
    std::fs::create_dir_all(&manual_dir)?;

    let images = priors
        .iter()
        .map(|prior| ColmapImage {
            name: prior.image_name.clone(),
            image_id: prior.image_id,
            camera_id: prior.camera_id,
            rotation: prior.qvec,
            translation: prior.tvec,
            points2d: vec![],
        })
        .collect::<Vec<_>>();

    let cameras = priors
        .iter()
        .map(|prior| ColmapCamera {
            camera_id: prior.camera_id,
            model_id: CameraModelId::Pinhole,
            width: prior.width as usize,
            height: prior.height as usize,
            params: pinhole_params(prior).to_vec(),
        })
        .collect::<Vec<_>>();

    write_images_txt(manual_dir.join("images.txt"), &images)?;
    write_cameras_txt(manual_dir.join("cameras.txt"), &cameras)?;
    write_points3d_txt(manual_dir.join("points3D.txt"), &[])?;
    Ok(())
}

/// Seed the database with one camera and one image row per prior.
///
/// Rows are written in camera order; the image row references the camera id
/// the writer returned.
pub fn populate_database<D: DatabaseWriter>(
    database: &mut D,
    priors: &[CameraPrior],
) -> Result<(), PipelineError> {
    for prior in priors {
        let camera_id = database.add_camera(
            PINHOLE_MODEL_CODE,
            prior.width as u32,
            prior.height as u32,
            &pinhole_params(prior),
        )?;
        database.add_image(
            &prior.image_name,
            camera_id,
            prior.qvec,
            prior.tvec,
            prior.image_id,
        )?;
    }
    Ok(())
}

/// Materialize one keyframe project from its camera priors.
///
/// Removes a stale `input.db`, ensures the project layout, writes the manual
/// model files and seeds the database.
pub fn materialize_project<D: DatabaseWriter>(
    project_dir: impl AsRef<Path>,
    priors: &[CameraPrior],
    database: &mut D,
) -> Result<(), PipelineError> {
    let project_dir = project_dir.as_ref();
    std::fs::create_dir_all(project_dir)?;

    let stale_db = project_dir.join("input.db");
    if stale_db.exists() {
        std::fs::remove_file(&stale_db)?;
    }

    write_manual_project(project_dir, priors)?;
    populate_database(database, priors)?;

    log::info!(
        "materialized {} camera priors into {}",
        priors.len(),
        project_dir.display()
    );
    Ok(())
}

/// Run one keyframe end to end: stage inputs, materialize the project and
/// drive the reconstruction.
pub fn process_keyframe<D: DatabaseWriter, R: Reconstructor>(
    scene_dir: impl AsRef<Path>,
    keyframe: usize,
    priors: &[CameraPrior],
    database: &mut D,
    reconstructor: &R,
) -> Result<(), PipelineError> {
    let scene_dir = scene_dir.as_ref();
    stage_keyframe_inputs(scene_dir, keyframe)?;

    let project = project_dir(scene_dir, keyframe);
    materialize_project(&project, priors, database)?;
    run_reconstruction(reconstructor, &project)
}

/// Process every keyframe of one scene.
///
/// Loads `poses_bounds.npy` once, converts it to camera priors and runs each
/// keyframe project with a fresh database from `make_database`. The first
/// failing keyframe aborts the scene.
pub fn process_scene<D, R, F>(
    scene_dir: impl AsRef<Path>,
    start_frame: usize,
    end_frame: usize,
    gop: usize,
    reconstructor: &R,
    mut make_database: F,
) -> Result<(), PipelineError>
where
    D: DatabaseWriter,
    R: Reconstructor,
    F: FnMut() -> D,
{
    let scene_dir = scene_dir.as_ref();
    let (bundles, _bounds) = read_poses_bounds(scene_dir.join("poses_bounds.npy"))?;
    let priors = convert_pose_bundles(&bundles)?;

    for keyframe in keyframes(start_frame, end_frame, gop)? {
        log::info!(
            "processing keyframe {} of scene {}",
            keyframe,
            scene_dir.display()
        );
        let mut database = make_database();
        process_keyframe(scene_dir, keyframe, &priors, &mut database, reconstructor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use gopsfm_3d::io::colmap::{read_cameras_txt, read_images_txt, read_points3d_txt};

    fn sample_priors() -> Vec<CameraPrior> {
        vec![
            CameraPrior {
                image_id: 1,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [0.5, -1.0, 2.0],
                camera_id: 1,
                image_name: "cam00.png".to_string(),
                width: 1280.0,
                height: 1024.0,
                focal: 800.0,
            },
            CameraPrior {
                image_id: 2,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [1.5, -1.0, 2.0],
                camera_id: 2,
                image_name: "cam01.png".to_string(),
                width: 1281.0,
                height: 1025.0,
                focal: 800.0,
            },
        ]
    }

    #[test]
    fn manual_files_mirror_the_priors() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        write_manual_project(tmp.path(), &sample_priors())?;

        let manual = tmp.path().join("manual");
        let images = read_images_txt(manual.join("images.txt"))?;
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].image_id, 1);
        assert_eq!(images[0].name, "cam00.png");
        assert!(images[0].points2d.is_empty());

        let cameras = read_cameras_txt(manual.join("cameras.txt"))?;
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].params, vec![800.0, 800.0, 640.0, 512.0]);
        // odd dimensions floor the principal point
        assert_eq!(cameras[1].params, vec![800.0, 800.0, 640.0, 512.0]);

        assert!(read_points3d_txt(manual.join("points3D.txt"))?.is_empty());
        Ok(())
    }

    #[test]
    fn database_rows_follow_camera_order() -> Result<(), PipelineError> {
        let mut db = MemoryDatabase::new();
        populate_database(&mut db, &sample_priors())?;

        assert_eq!(db.cameras.len(), 2);
        assert_eq!(db.images.len(), 2);
        assert_eq!(db.cameras[0].model_id, 1);
        assert_eq!(db.cameras[0].width, 1280);
        assert_eq!(db.images[0].image_id, 1);
        assert_eq!(db.images[0].camera_id, db.cameras[0].camera_id);
        assert_eq!(db.images[1].image_id, 2);
        Ok(())
    }

    #[test]
    fn materialize_removes_a_stale_database() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        std::fs::write(tmp.path().join("input.db"), b"stale")?;

        let mut db = MemoryDatabase::new();
        materialize_project(tmp.path(), &sample_priors(), &mut db)?;

        assert!(!tmp.path().join("input.db").exists());
        assert!(tmp.path().join("manual").join("images.txt").is_file());
        Ok(())
    }
}
