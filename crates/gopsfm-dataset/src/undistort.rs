use nalgebra::Matrix3;
use ndarray::Array2;

use crate::error::DatasetError;

/// Iterations of the inverse distortion fixed point.
const UNDISTORT_ITERATIONS: usize = 5;

/// Sample grid size per edge for the optimal camera matrix estimation.
const GRID_SIZE: usize = 9;

fn distort_normalized(x: f64, y: f64, dist: &[f64; 4]) -> (f64, f64) {
    let [k1, k2, p1, p2] = *dist;
    let r2 = x * x + y * y;
    let radial = 1.0 + r2 * (k1 + r2 * k2);
    let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
    (xd, yd)
}

/// Undistort pixel coordinates into normalized image coordinates.
///
/// Inverts the radial-tangential model `(k1, k2, p1, p2)` by fixed-point
/// iteration; five rounds are enough for the coefficient magnitudes the
/// calibration produces.
pub fn undistort_points(
    points: &[(f64, f64)],
    k: &Matrix3<f64>,
    dist: &[f64; 4],
) -> Vec<(f64, f64)> {
    let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
    let (cx, cy) = (k[(0, 2)], k[(1, 2)]);
    let [k1, k2, p1, p2] = *dist;

    points
        .iter()
        .map(|&(u, v)| {
            let x0 = (u - cx) / fx;
            let y0 = (v - cy) / fy;
            let (mut x, mut y) = (x0, y0);
            for _ in 0..UNDISTORT_ITERATIONS {
                let r2 = x * x + y * y;
                let icdist = 1.0 / (1.0 + r2 * (k1 + r2 * k2));
                let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
                let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
                x = (x0 - dx) * icdist;
                y = (y0 - dy) * icdist;
            }
            (x, y)
        })
        .collect()
}

/// Zero-alpha optimal new camera matrix.
///
/// Undistorts a boundary grid of sample pixels, takes the inner rectangle
/// spanned by the edge rows and columns and maps it onto the full image, so
/// every destination pixel has a valid source.
pub fn optimal_new_camera_matrix(
    k: &Matrix3<f64>,
    dist: &[f64; 4],
    width: usize,
    height: usize,
) -> Matrix3<f64> {
    let step_x = (width - 1) as f64 / (GRID_SIZE - 1) as f64;
    let step_y = (height - 1) as f64 / (GRID_SIZE - 1) as f64;

    let mut pixels = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
    for j in 0..GRID_SIZE {
        for i in 0..GRID_SIZE {
            pixels.push((i as f64 * step_x, j as f64 * step_y));
        }
    }
    let normalized = undistort_points(&pixels, k, dist);

    let mut inner_x0 = f64::NEG_INFINITY;
    let mut inner_x1 = f64::INFINITY;
    let mut inner_y0 = f64::NEG_INFINITY;
    let mut inner_y1 = f64::INFINITY;
    for (idx, &(x, y)) in normalized.iter().enumerate() {
        let i = idx % GRID_SIZE;
        let j = idx / GRID_SIZE;
        if i == 0 {
            inner_x0 = inner_x0.max(x);
        }
        if i == GRID_SIZE - 1 {
            inner_x1 = inner_x1.min(x);
        }
        if j == 0 {
            inner_y0 = inner_y0.max(y);
        }
        if j == GRID_SIZE - 1 {
            inner_y1 = inner_y1.min(y);
        }
    }

    let fx = (width - 1) as f64 / (inner_x1 - inner_x0);
    let fy = (height - 1) as f64 / (inner_y1 - inner_y0);
    let cx = -fx * inner_x0;
    let cy = -fy * inner_y0;

    Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
}

/// Per-pixel source lookup maps rectifying a radial-tangential camera.
///
/// Each destination pixel is back-projected through `k_new`, pushed through
/// the forward distortion model and re-projected through the original `k`.
pub fn perspective_rectify_map(
    k: &Matrix3<f64>,
    dist: &[f64; 4],
    k_new: &Matrix3<f64>,
    width: usize,
    height: usize,
) -> (Array2<f32>, Array2<f32>) {
    let mut map_x = Array2::zeros((height, width));
    let mut map_y = Array2::zeros((height, width));

    for row in 0..height {
        for col in 0..width {
            let x = (col as f64 - k_new[(0, 2)]) / k_new[(0, 0)];
            let y = (row as f64 - k_new[(1, 2)]) / k_new[(1, 1)];
            let (xd, yd) = distort_normalized(x, y, dist);
            map_x[[row, col]] = (k[(0, 0)] * xd + k[(0, 2)]) as f32;
            map_y[[row, col]] = (k[(1, 1)] * yd + k[(1, 2)]) as f32;
        }
    }
    (map_x, map_y)
}

/// Rectification output of a fisheye camera.
#[derive(Debug, Clone)]
pub struct FisheyeMaps {
    /// Source column lookup, full image shape.
    pub map_x: Array2<f32>,
    /// Source row lookup, full image shape.
    pub map_y: Array2<f32>,
    /// Validity mask, cropped to the region of interest.
    pub mask: Array2<bool>,
    /// Region of interest `(x, y, width, height)` in the remapped image.
    pub roi: [usize; 4],
    /// Intrinsics with the principal point shifted into the region.
    pub k: Matrix3<f64>,
}

/// Source lookup maps, validity mask and cropped intrinsics for a fisheye
/// camera with distortion `(k1, k2, k3, k4)`.
///
/// The radial factor is the even polynomial
/// `1 + k1 th^2 + k2 th^4 + k3 th^6 + k4 th^8` of the ray angle, and the
/// lookups recenter on `floor(size / 2)`. The region of interest is the
/// bounding rectangle of the strictly in-bounds lookups; a camera whose
/// lookups all fall outside the image is degenerate.
pub fn fisheye_rectify_map(
    k: &Matrix3<f64>,
    dist: &[f64; 4],
    width: usize,
    height: usize,
    camera_id: u32,
) -> Result<FisheyeMaps, DatasetError> {
    let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
    let (cx, cy) = (k[(0, 2)], k[(1, 2)]);
    let [k1, k2, k3, k4] = *dist;

    let mut map_x = Array2::zeros((height, width));
    let mut map_y = Array2::zeros((height, width));
    let mut mask = Array2::from_elem((height, width), false);

    let half_width = (width / 2) as f64;
    let half_height = (height / 2) as f64;

    for row in 0..height {
        for col in 0..width {
            let x1 = (col as f64 - cx) / fx;
            let y1 = (row as f64 - cy) / fy;
            let theta2 = x1 * x1 + y1 * y1;
            let r = 1.0 + theta2 * (k1 + theta2 * (k2 + theta2 * (k3 + theta2 * k4)));

            let sx = fx * x1 * r + half_width;
            let sy = fy * y1 * r + half_height;
            map_x[[row, col]] = sx as f32;
            map_y[[row, col]] = sy as f32;
            mask[[row, col]] =
                sx > 0.0 && sy > 0.0 && sx < (width - 1) as f64 && sy < (height - 1) as f64;
        }
    }

    let mut x_min = usize::MAX;
    let mut x_max = 0;
    let mut y_min = usize::MAX;
    let mut y_max = 0;
    for ((row, col), &valid) in mask.indexed_iter() {
        if valid {
            x_min = x_min.min(col);
            x_max = x_max.max(col + 1);
            y_min = y_min.min(row);
            y_max = y_max.max(row + 1);
        }
    }
    if x_min == usize::MAX {
        return Err(DatasetError::EmptyUndistortionRoi(camera_id));
    }

    let cropped_mask = mask
        .slice(ndarray::s![y_min..y_max, x_min..x_max])
        .to_owned();

    let mut k_out = *k;
    k_out[(0, 2)] -= x_min as f64;
    k_out[(1, 2)] -= y_min as f64;

    Ok(FisheyeMaps {
        map_x,
        map_y,
        mask: cropped_mask,
        roi: [x_min, y_min, x_max - x_min, y_max - y_min],
        k: k_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_k() -> Matrix3<f64> {
        Matrix3::new(100.0, 0.0, 4.0, 0.0, 100.0, 3.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn zero_distortion_undistorts_to_plain_normalization() {
        let k = sample_k();
        let points = vec![(4.0, 3.0), (104.0, 103.0)];
        let out = undistort_points(&points, &k, &[0.0; 4]);

        assert_relative_eq!(out[0].0, 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[0].1, 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[1].0, 1.0, epsilon = 1e-12);
        assert_relative_eq!(out[1].1, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn undistort_inverts_the_forward_model() {
        let k = sample_k();
        let dist = [-0.02, 0.005, 0.001, -0.001];

        // distort a normalized point, project it and undistort it back
        let (x, y) = (0.05, -0.08);
        let (xd, yd) = distort_normalized(x, y, &dist);
        let pixel = (k[(0, 0)] * xd + k[(0, 2)], k[(1, 1)] * yd + k[(1, 2)]);

        let out = undistort_points(&[pixel], &k, &dist);
        assert_relative_eq!(out[0].0, x, epsilon = 1e-6);
        assert_relative_eq!(out[0].1, y, epsilon = 1e-6);
    }

    #[test]
    fn zero_distortion_keeps_the_camera_matrix() {
        let k = sample_k();
        let k_new = optimal_new_camera_matrix(&k, &[0.0; 4], 9, 7);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(k_new[(i, j)], k[(i, j)], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn zero_distortion_rectify_map_is_identity() {
        let k = sample_k();
        let (map_x, map_y) = perspective_rectify_map(&k, &[0.0; 4], &k, 8, 6);
        for row in 0..6 {
            for col in 0..8 {
                assert_relative_eq!(map_x[[row, col]], col as f32, epsilon = 1e-4);
                assert_relative_eq!(map_y[[row, col]], row as f32, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn fisheye_zero_coefficients_give_a_shifted_identity() -> Result<(), DatasetError> {
        // principal point at the half-size offsets makes the lookup identity
        let k = Matrix3::new(50.0, 0.0, 4.0, 0.0, 50.0, 3.0, 0.0, 0.0, 1.0);
        let maps = fisheye_rectify_map(&k, &[0.0; 4], 8, 6, 1)?;

        assert_relative_eq!(maps.map_x[[2, 5]], 5.0, epsilon = 1e-5);
        assert_relative_eq!(maps.map_y[[2, 5]], 2.0, epsilon = 1e-5);

        // strict bounds drop the outermost rows and columns
        assert_eq!(maps.roi, [1, 1, 6, 4]);
        assert_eq!(maps.mask.dim(), (4, 6));
        assert!(maps.mask.iter().all(|&v| v));
        assert_relative_eq!(maps.k[(0, 2)], 3.0, epsilon = 1e-12);
        assert_relative_eq!(maps.k[(1, 2)], 2.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn degenerate_intrinsics_empty_the_roi() {
        // a principal point far off the image pushes every lookup out
        let k = Matrix3::new(50.0, 0.0, 100.0, 0.0, 50.0, 100.0, 0.0, 0.0, 1.0);
        let result = fisheye_rectify_map(&k, &[0.0; 4], 8, 6, 3);
        assert!(matches!(
            result,
            Err(DatasetError::EmptyUndistortionRoi(3))
        ));
    }
}
