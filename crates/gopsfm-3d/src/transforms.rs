use nalgebra::Matrix4;

/// Convert a rotation matrix to a unit quaternion in `(w, x, y, z)` order.
///
/// Uses the symmetric 4x4 eigenproblem construction (Shepperd/Markley): the
/// eigenvector for the largest eigenvalue of the K matrix is the quaternion.
/// This matches the reconstruction tool's own extraction, which is not the
/// trace-based shortcut. The result is sign normalized so that `w >= 0`.
///
/// PRECONDITION: `rotation` is orthonormal.
pub fn rotation_matrix_to_quaternion(rotation: &[[f64; 3]; 3]) -> [f64; 4] {
    let [[rxx, ryx, rzx], [rxy, ryy, rzy], [rxz, ryz, rzz]] = *rotation;

    // symmetric K matrix, rows/cols ordered (x, y, z, w)
    let k = Matrix4::new(
        rxx - ryy - rzz,
        ryx + rxy,
        rzx + rxz,
        ryz - rzy,
        ryx + rxy,
        ryy - rxx - rzz,
        rzy + ryz,
        rzx - rxz,
        rzx + rxz,
        rzy + ryz,
        rzz - rxx - ryy,
        rxy - ryx,
        ryz - rzy,
        rzx - rxz,
        rxy - ryx,
        rxx + ryy + rzz,
    ) / 3.0;

    let eigen = k.symmetric_eigen();
    let mut largest = 0;
    for i in 1..4 {
        if eigen.eigenvalues[i] > eigen.eigenvalues[largest] {
            largest = i;
        }
    }
    let v = eigen.eigenvectors.column(largest);

    // reorder (x, y, z, w) -> (w, x, y, z) and canonicalize the sign
    let mut qvec = [v[3], v[0], v[1], v[2]];
    if qvec[0] < 0.0 {
        for q in qvec.iter_mut() {
            *q = -*q;
        }
    }
    qvec
}

/// Convert a unit quaternion in `(w, x, y, z)` order to a rotation matrix.
pub fn quaternion_to_rotation_matrix(qvec: &[f64; 4]) -> [[f64; 3]; 3] {
    let [w, x, y, z] = *qvec;
    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
        ],
        [
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
        ],
        [
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]
}
