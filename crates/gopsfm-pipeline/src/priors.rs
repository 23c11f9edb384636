use gopsfm_3d::poses::{world_to_camera, PoseBundle};
use gopsfm_3d::transforms::rotation_matrix_to_quaternion;

use crate::error::PipelineError;

/// The manual pose prior of one camera, in the reconstruction tool's
/// world-to-camera convention.
#[derive(Debug, Clone)]
pub struct CameraPrior {
    /// Image id, numbered from 1 in camera order.
    pub image_id: u32,
    /// Rotation quaternion, scalar first (qw, qx, qy, qz), qw >= 0.
    pub qvec: [f64; 4],
    /// Translation (x, y, z).
    pub tvec: [f64; 3],
    /// Camera id, equal to the image id (one camera per image).
    pub camera_id: u32,
    /// Staged image name, `cam{index:02}.png`.
    pub image_name: String,
    /// Image width in pixels.
    pub width: f64,
    /// Image height in pixels.
    pub height: f64,
    /// Focal length in pixels.
    pub focal: f64,
}

/// Convert legacy pose bundles into camera priors.
///
/// Pure and order preserving: bundle `i` becomes the prior with image id
/// `i + 1` and image name `cam{i:02}.png`, matching the staged inputs.
pub fn convert_pose_bundles(bundles: &[PoseBundle]) -> Result<Vec<CameraPrior>, PipelineError> {
    let w2c = world_to_camera(bundles)?;

    let priors = bundles
        .iter()
        .zip(w2c.iter())
        .enumerate()
        .map(|(index, (bundle, m))| {
            let mut rotation = [[0.0; 3]; 3];
            let mut tvec = [0.0; 3];
            for row in 0..3 {
                for col in 0..3 {
                    rotation[row][col] = m[(row, col)];
                }
                tvec[row] = m[(row, 3)];
            }
            let qvec = rotation_matrix_to_quaternion(&rotation);

            CameraPrior {
                image_id: index as u32 + 1,
                qvec,
                tvec,
                camera_id: index as u32 + 1,
                image_name: format!("cam{:02}.png", index),
                width: bundle.width,
                height: bundle.height,
                focal: bundle.focal,
            }
        })
        .collect::<Vec<_>>();

    log::info!("converted {} pose bundles into camera priors", priors.len());
    Ok(priors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle(tx: f64) -> PoseBundle {
        PoseBundle {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [tx, 0.0, 1.0],
            height: 1024.0,
            width: 1280.0,
            focal: 800.0,
        }
    }

    #[test]
    fn priors_are_one_based_and_named_in_order() -> Result<(), PipelineError> {
        let bundles = vec![sample_bundle(0.0), sample_bundle(2.0)];
        let priors = convert_pose_bundles(&bundles)?;

        assert_eq!(priors.len(), 2);
        assert_eq!(priors[0].image_id, 1);
        assert_eq!(priors[0].camera_id, 1);
        assert_eq!(priors[0].image_name, "cam00.png");
        assert_eq!(priors[1].image_id, 2);
        assert_eq!(priors[1].image_name, "cam01.png");
        assert_eq!(priors[1].width, 1280.0);
        assert_eq!(priors[1].focal, 800.0);
        Ok(())
    }

    #[test]
    fn prior_quaternions_have_nonnegative_scalar() -> Result<(), PipelineError> {
        let mut bundles = vec![sample_bundle(0.0)];
        // half turn about the vertical axis
        bundles[0].rotation = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];

        let priors = convert_pose_bundles(&bundles)?;
        assert!(priors[0].qvec[0] >= 0.0);
        Ok(())
    }
}
