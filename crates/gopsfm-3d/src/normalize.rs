use nalgebra::{Matrix3, Matrix4, Vector3};

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn median3(points: impl Iterator<Item = Vector3<f64>> + Clone) -> Vector3<f64> {
    let mut out = Vector3::zeros();
    for axis in 0..3 {
        let mut vals: Vec<f64> = points.clone().map(|p| p[axis]).collect();
        out[axis] = median(&mut vals);
    }
    out
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Compute a similarity transform that re-centers and re-scales a camera rig.
///
/// The rig's mean up axis is rotated onto +z, the scene is re-centered on the
/// per-axis median of the camera focus points, and uniformly re-scaled so the
/// median camera distance from the new origin is one. Returns the identity
/// for an empty rig.
pub fn similarity_from_cameras(camtoworlds: &[Matrix4<f64>]) -> Matrix4<f64> {
    if camtoworlds.is_empty() {
        return Matrix4::identity();
    }

    let up_camspace = Vector3::new(0.0, -1.0, 0.0);

    // mean world up axis over the rig
    let mut world_up = Vector3::zeros();
    for c2w in camtoworlds {
        let r = c2w.fixed_view::<3, 3>(0, 0);
        world_up += r * up_camspace;
    }
    world_up /= camtoworlds.len() as f64;
    world_up.normalize_mut();

    // rotation aligning the mean up axis with +z (Rodrigues form)
    let c = up_camspace.dot(&world_up);
    let r_align = if c > -1.0 {
        let s = skew(&world_up.cross(&up_camspace));
        Matrix3::identity() + s + s * s / (1.0 + c)
    } else {
        Matrix3::new(-1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0)
    };

    // focus point of each camera: its position projected onto the plane
    // through the origin orthogonal to the viewing direction
    let mut nearest = Vec::with_capacity(camtoworlds.len());
    let mut positions = Vec::with_capacity(camtoworlds.len());
    for c2w in camtoworlds {
        let r = r_align * c2w.fixed_view::<3, 3>(0, 0);
        let t = r_align * c2w.fixed_view::<3, 1>(0, 3);
        let fwd = r * Vector3::new(0.0, 0.0, 1.0);
        nearest.push(t + fwd * fwd.dot(&-t));
        positions.push(Vector3::from(t));
    }
    let translate = -median3(nearest.iter().copied());

    let mut dists: Vec<f64> = positions.iter().map(|t| (t + translate).norm()).collect();
    let scale = 1.0 / median(&mut dists);

    let mut transform = Matrix4::identity();
    transform.fixed_view_mut::<3, 3>(0, 0).copy_from(&r_align);
    transform.fixed_view_mut::<3, 1>(0, 3).copy_from(&translate);
    let mut top = transform.fixed_view_mut::<3, 4>(0, 0);
    top *= scale;
    transform
}

/// Compute a rigid transform aligning the dominant axes of a point cloud
/// with the coordinate axes.
///
/// The covariance of the median-centered cloud is eigendecomposed and the
/// eigenvectors, ordered by descending eigenvalue and sign-fixed to a proper
/// rotation, become the new axes.
pub fn align_principal_axes(points: &[[f64; 3]]) -> Matrix4<f64> {
    if points.len() < 2 {
        return Matrix4::identity();
    }

    let centroid = median3(points.iter().map(|p| Vector3::from(*p)));

    // unbiased covariance of the centered cloud
    let mut cov = Matrix3::zeros();
    for p in points {
        let d = Vector3::from(*p) - centroid;
        cov += d * d.transpose();
    }
    cov /= (points.len() - 1) as f64;

    let eigen = cov.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let mut axes = Matrix3::zeros();
    for (dst, &src) in order.iter().enumerate() {
        axes.set_column(dst, &eigen.eigenvectors.column(src));
    }
    if axes.determinant() < 0.0 {
        let negated = -axes.column(0).into_owned();
        axes.set_column(0, &negated);
    }

    let rotation = axes.transpose();
    let mut transform = Matrix4::identity();
    transform.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    transform
        .fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&(-rotation * centroid));
    transform
}

/// Apply a (similarity) transform to camera-to-world matrices in place.
///
/// The rotation block of each result is re-normalized to unit scale so the
/// poses stay rigid after a scaled transform.
pub fn transform_cameras(transform: &Matrix4<f64>, camtoworlds: &mut [Matrix4<f64>]) {
    for c2w in camtoworlds.iter_mut() {
        let mut m = transform * *c2w;
        let scaling = m.fixed_view::<1, 3>(0, 0).norm();
        let mut rot = m.fixed_view_mut::<3, 3>(0, 0);
        rot /= scaling;
        *c2w = m;
    }
}

/// Apply a (similarity) transform to 3D points in place.
pub fn transform_points(transform: &Matrix4<f64>, points: &mut [[f64; 3]]) {
    let r = transform.fixed_view::<3, 3>(0, 0).into_owned();
    let t = transform.fixed_view::<3, 1>(0, 3).into_owned();
    for p in points.iter_mut() {
        let q = r * Vector3::from(*p) + t;
        *p = [q.x, q.y, q.z];
    }
}

/// Size of the scene measured by the cameras: the maximum distance from any
/// camera position to the mean camera position.
pub fn scene_scale(camtoworlds: &[Matrix4<f64>]) -> f64 {
    if camtoworlds.is_empty() {
        return 0.0;
    }
    let positions: Vec<Vector3<f64>> = camtoworlds
        .iter()
        .map(|c2w| c2w.fixed_view::<3, 1>(0, 3).into_owned())
        .collect();
    let center: Vector3<f64> =
        positions.iter().copied().sum::<Vector3<f64>>() / positions.len() as f64;
    positions
        .iter()
        .map(|p| (p - center).norm())
        .fold(0.0, f64::max)
}
