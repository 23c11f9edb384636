use std::path::Path;

use nalgebra::Matrix4;
use ndarray::Array2;

/// Error types for the pose bundle module.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    /// The pose bundle file does not exist.
    #[error("pose bundle file does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Error reading the numpy payload.
    #[error("error reading the numpy payload")]
    NpyError(#[from] ndarray_npy::ReadNpyError),

    /// A pose row does not have the expected layout.
    #[error("pose row has {0} columns, expected at least 17")]
    InvalidRowLength(usize),

    /// A camera-to-world matrix could not be inverted.
    #[error("pose matrix for camera {0} is not invertible")]
    SingularPose(usize),
}

/// One camera of the legacy forward-facing pose format.
///
/// The rotation columns are the camera direction axes in the legacy
/// convention (right, down, backward); the extra column carries the image
/// height, width and focal length. Immutable after load.
#[derive(Debug, Clone)]
pub struct PoseBundle {
    /// Rotation block, row major. Columns are the camera axes.
    pub rotation: [[f64; 3]; 3],
    /// Camera center in world coordinates.
    pub translation: [f64; 3],
    /// Image height in pixels.
    pub height: f64,
    /// Image width in pixels.
    pub width: f64,
    /// Focal length in pixels.
    pub focal: f64,
}

/// Read a `poses_bounds.npy` file.
///
/// The file holds one row per camera: 15 values reshaping row major to a
/// 3x5 matrix (3x3 rotation, translation column, height/width/focal column)
/// followed by the two depth bounds.
///
/// # Arguments
///
/// * `path` - The path to the `.npy` file.
///
/// # Returns
///
/// The pose bundles and the per-camera `[near, far]` bounds.
pub fn read_poses_bounds(
    path: impl AsRef<Path>,
) -> Result<(Vec<PoseBundle>, Vec<[f64; 2]>), PoseError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PoseError::FileDoesNotExist(path.to_path_buf()));
    }

    let raw: Array2<f64> = ndarray_npy::read_npy(path)?;
    if raw.ncols() < 17 {
        return Err(PoseError::InvalidRowLength(raw.ncols()));
    }

    let mut bundles = Vec::with_capacity(raw.nrows());
    let mut bounds = Vec::with_capacity(raw.nrows());
    for row in raw.rows() {
        // row major 3x5 block: m[r][c] = row[r * 5 + c]
        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for r in 0..3 {
            for c in 0..3 {
                rotation[r][c] = row[r * 5 + c];
            }
            translation[r] = row[r * 5 + 3];
        }
        bundles.push(PoseBundle {
            rotation,
            translation,
            height: row[4],
            width: row[9],
            focal: row[14],
        });
        bounds.push([row[15], row[16]]);
    }

    Ok((bundles, bounds))
}

/// Build the homogeneous camera-to-world matrix of one pose bundle.
///
/// The direction columns are permuted as `(col1, col0, -col2)` to convert
/// from the legacy camera convention to the reconstruction tool's one. The
/// permutation is an involution: applying it twice recovers the input.
pub fn camera_to_world(bundle: &PoseBundle) -> Matrix4<f64> {
    let r = &bundle.rotation;
    let t = &bundle.translation;
    let mut out = Matrix4::identity();
    for row in 0..3 {
        out[(row, 0)] = r[row][1];
        out[(row, 1)] = r[row][0];
        out[(row, 2)] = -r[row][2];
        out[(row, 3)] = t[row];
    }
    out
}

/// Convert a set of pose bundles into world-to-camera matrices.
///
/// Pure and order preserving: camera `i` of the input maps to matrix `i`
/// of the output.
///
/// # Errors
///
/// Returns [`PoseError::SingularPose`] if a camera-to-world matrix cannot
/// be inverted.
pub fn world_to_camera(bundles: &[PoseBundle]) -> Result<Vec<Matrix4<f64>>, PoseError> {
    bundles
        .iter()
        .enumerate()
        .map(|(i, bundle)| {
            camera_to_world(bundle)
                .try_inverse()
                .ok_or(PoseError::SingularPose(i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray_npy::write_npy;

    fn sample_bundle() -> PoseBundle {
        PoseBundle {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.5, -1.0, 2.0],
            height: 1024.0,
            width: 1280.0,
            focal: 800.0,
        }
    }

    #[test]
    fn axis_remap_is_an_involution() {
        let remap = |r: &[[f64; 3]; 3]| -> [[f64; 3]; 3] {
            let mut out = [[0.0; 3]; 3];
            for row in 0..3 {
                out[row][0] = r[row][1];
                out[row][1] = r[row][0];
                out[row][2] = -r[row][2];
            }
            out
        };

        let r = [[0.36, 0.48, -0.8], [-0.8, 0.6, 0.0], [0.48, 0.64, 0.6]];
        let twice = remap(&remap(&r));
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(twice[i][j], r[i][j]);
            }
        }
    }

    #[test]
    fn world_to_camera_inverts_camera_to_world() -> Result<(), PoseError> {
        let bundle = sample_bundle();
        let c2w = camera_to_world(&bundle);
        let w2c = world_to_camera(std::slice::from_ref(&bundle))?;

        let product = w2c[0] * c2w;
        let eye = Matrix4::<f64>::identity();
        for i in 0..4 {
            for j in 0..4 {
                assert_relative_eq!(product[(i, j)], eye[(i, j)], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn conversion_preserves_camera_order() -> Result<(), PoseError> {
        let mut bundles = vec![sample_bundle(), sample_bundle()];
        bundles[1].translation = [10.0, 0.0, 0.0];

        let w2c = world_to_camera(&bundles)?;
        assert_eq!(w2c.len(), 2);

        // w2c translation is -R^T * t, so distinct centers stay distinct
        let c0 = w2c[0].fixed_view::<3, 1>(0, 3).into_owned();
        let c1 = w2c[1].fixed_view::<3, 1>(0, 3).into_owned();
        assert!((c0 - c1).norm() > 1.0);
        Ok(())
    }

    #[test]
    fn read_poses_bounds_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("poses_bounds.npy");

        // identity rotation, translation (1,2,3), H/W/F 480/640/500, bounds
        let mut row = vec![0.0f64; 17];
        row[0] = 1.0;
        row[6] = 1.0;
        row[12] = 1.0;
        row[3] = 1.0;
        row[8] = 2.0;
        row[13] = 3.0;
        row[4] = 480.0;
        row[9] = 640.0;
        row[14] = 500.0;
        row[15] = 0.1;
        row[16] = 10.0;

        let arr = Array2::from_shape_vec((1, 17), row)?;
        write_npy(&path, &arr)?;

        let (bundles, bounds) = read_poses_bounds(&path)?;
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].translation, [1.0, 2.0, 3.0]);
        assert_eq!(bundles[0].height, 480.0);
        assert_eq!(bundles[0].width, 640.0);
        assert_eq!(bundles[0].focal, 500.0);
        assert_eq!(bounds[0], [0.1, 10.0]);
        Ok(())
    }

    #[test]
    fn read_poses_bounds_missing_file_is_fatal() {
        let err = read_poses_bounds("/definitely/not/here.npy");
        assert!(matches!(err, Err(PoseError::FileDoesNotExist(_))));
    }
}
