use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use nalgebra::{Matrix3, Matrix4};
use ndarray::Array2;
use serde::Deserialize;

use gopsfm_3d::io::colmap::{
    read_cameras_bin, read_cameras_txt, read_images_bin, read_images_txt, read_points3d_bin,
    read_points3d_txt, CameraModelId, ColmapCamera, ColmapImage, ColmapPoint3d,
};
use gopsfm_3d::normalize::{
    align_principal_axes, scene_scale, similarity_from_cameras, transform_cameras,
    transform_points,
};
use gopsfm_3d::poses::read_poses_bounds;
use gopsfm_3d::transforms::quaternion_to_rotation_matrix;

use crate::error::DatasetError;
use crate::undistort::{fisheye_rectify_map, optimal_new_camera_matrix, perspective_rectify_map};

/// Distortion classification of a calibrated camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistortionModel {
    /// Radial-tangential distortion `(k1, k2, p1, p2)`.
    Perspective,
    /// Even-polynomial fisheye distortion `(k1, k2, k3, k4)`.
    Fisheye,
}

/// Undistortion state of one camera with non-trivial distortion.
#[derive(Debug, Clone)]
pub struct CalibrationRecord {
    /// Distortion classification.
    pub model: DistortionModel,
    /// Source column lookup, full image shape.
    pub map_x: Array2<f32>,
    /// Source row lookup, full image shape.
    pub map_y: Array2<f32>,
    /// Crop rectangle `(x, y, width, height)` of the remapped image.
    pub roi: [usize; 4],
    /// Validity mask, cropped; fisheye only.
    pub mask: Option<Array2<bool>>,
}

/// Extended per-scene metadata, merged over defaults from
/// `ext_metadata.json` when the file exists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtMetadata {
    /// Radius scale of the rendered spiral path.
    pub spiral_radius_scale: f64,
    /// Skip the `_<factor>` image directory suffix convention.
    pub no_factor_suffix: bool,
}

impl Default for ExtMetadata {
    fn default() -> Self {
        Self {
            spiral_radius_scale: 1.0,
            no_factor_suffix: false,
        }
    }
}

/// Configuration of [`Parser::new`].
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Scene directory holding the reconstruction outputs and `png/` frames.
    pub data_dir: PathBuf,
    /// Integer downscale factor applied to images and intrinsics.
    pub factor: usize,
    /// Normalize the world frame from the camera rig and point cloud.
    pub normalize: bool,
    /// Keyframe whose reconstruction provides the calibration.
    pub first_frame: usize,
}

/// Calibration state of one reconstructed keyframe, shared by every sample.
#[derive(Debug)]
pub struct Parser {
    /// Scene directory.
    pub data_dir: PathBuf,
    /// Integer downscale factor.
    pub factor: usize,
    /// Image names, sorted.
    pub camera_names: Vec<String>,
    /// Extracted-frame directories, sorted; index is the camera index.
    pub camera_paths: Vec<PathBuf>,
    /// Camera-to-world matrices, one per image, sorted like the names.
    pub camtoworlds: Vec<Matrix4<f64>>,
    /// Sparse-model camera id of each image, sorted like the names.
    pub camera_ids: Vec<u32>,
    /// Intrinsics per camera id, rescaled and undistorted.
    pub intrinsics: HashMap<u32, Matrix3<f64>>,
    /// Distortion coefficients per camera id; empty means none.
    pub distortion: HashMap<u32, Vec<f64>>,
    /// Image size `(width, height)` per camera id after rescale and crop.
    pub image_sizes: HashMap<u32, (usize, usize)>,
    /// Undistortion state per camera id with distortion.
    pub calibrations: HashMap<u32, CalibrationRecord>,
    /// Triangulated points.
    pub points: Vec<[f64; 3]>,
    /// Reprojection error per point.
    pub points_err: Vec<f64>,
    /// Color per point.
    pub points_rgb: Vec<[u8; 3]>,
    /// Observed point indices per image name.
    pub point_indices: HashMap<String, Vec<usize>>,
    /// World normalization transform; identity when disabled.
    pub transform: Matrix4<f64>,
    /// Per-camera depth bounds, `[0.01, 1.0]` when no pose file exists.
    pub bounds: Vec<[f64; 2]>,
    /// Extended metadata with defaults.
    pub ext: ExtMetadata,
    /// Max distance of any camera from the mean camera position.
    pub scene_scale: f64,
}

fn sparse_model_dir(data_dir: &Path, first_frame: usize) -> Result<PathBuf, DatasetError> {
    let keyed = data_dir
        .join(format!("colmap_{}", first_frame))
        .join("sparse")
        .join("0");
    if keyed.is_dir() {
        return Ok(keyed);
    }
    let flat = data_dir.join("sparse").join("0");
    if flat.is_dir() {
        return Ok(flat);
    }
    Err(DatasetError::ColmapDirNotFound(data_dir.to_path_buf()))
}

fn load_cameras(dir: &Path) -> Result<Vec<ColmapCamera>, DatasetError> {
    let bin = dir.join("cameras.bin");
    if bin.is_file() {
        Ok(read_cameras_bin(bin)?)
    } else {
        Ok(read_cameras_txt(dir.join("cameras.txt"))?)
    }
}

fn load_images(dir: &Path) -> Result<Vec<ColmapImage>, DatasetError> {
    let bin = dir.join("images.bin");
    if bin.is_file() {
        Ok(read_images_bin(bin)?)
    } else {
        Ok(read_images_txt(dir.join("images.txt"))?)
    }
}

fn load_points(dir: &Path) -> Result<Vec<ColmapPoint3d>, DatasetError> {
    let bin = dir.join("points3D.bin");
    if bin.is_file() {
        Ok(read_points3d_bin(bin)?)
    } else {
        Ok(read_points3d_txt(dir.join("points3D.txt"))?)
    }
}

/// Distortion coefficients and classification of a camera model.
fn classify_camera(camera: &ColmapCamera) -> Result<(Vec<f64>, DistortionModel), DatasetError> {
    let p = &camera.params;
    match camera.model_id {
        CameraModelId::SimplePinhole | CameraModelId::Pinhole => {
            Ok((vec![], DistortionModel::Perspective))
        }
        CameraModelId::SimpleRadial => Ok((vec![p[3], 0.0, 0.0, 0.0], DistortionModel::Perspective)),
        CameraModelId::Radial => Ok((vec![p[3], p[4], 0.0, 0.0], DistortionModel::Perspective)),
        CameraModelId::OpenCv => Ok((vec![p[4], p[5], p[6], p[7]], DistortionModel::Perspective)),
        CameraModelId::OpenCvFisheye => {
            Ok((vec![p[4], p[5], p[6], p[7]], DistortionModel::Fisheye))
        }
        other => Err(DatasetError::UnsupportedCameraModel(other.tag().to_string())),
    }
}

/// The pinhole part `(fx, fy, cx, cy)` of a camera's parameters.
fn pinhole_part(camera: &ColmapCamera) -> (f64, f64, f64, f64) {
    let p = &camera.params;
    match camera.model_id {
        // single-focal models store (f, cx, cy)
        CameraModelId::SimplePinhole | CameraModelId::SimpleRadial | CameraModelId::Radial => {
            (p[0], p[0], p[1], p[2])
        }
        _ => (p[0], p[1], p[2], p[3]),
    }
}

impl Parser {
    /// Parse the reconstruction of one keyframe into shared dataset state.
    pub fn new(config: ParserConfig) -> Result<Self, DatasetError> {
        let ParserConfig {
            data_dir,
            factor,
            normalize,
            first_frame,
        } = config;
        let factor = factor.max(1);

        let model_dir = sparse_model_dir(&data_dir, first_frame)?;
        let cameras = load_cameras(&model_dir)?;
        let images = load_images(&model_dir)?;
        let model_points = load_points(&model_dir)?;

        if images.is_empty() {
            return Err(DatasetError::NoImages);
        }

        let camera_by_id = cameras
            .iter()
            .map(|c| (c.camera_id, c))
            .collect::<HashMap<_, _>>();

        let mut camtoworlds = Vec::with_capacity(images.len());
        let mut camera_ids = Vec::with_capacity(images.len());
        let mut camera_names = Vec::with_capacity(images.len());
        let mut intrinsics = HashMap::new();
        let mut distortion = HashMap::new();
        let mut image_sizes = HashMap::new();
        let mut models = HashMap::new();

        for image in &images {
            let rotation = quaternion_to_rotation_matrix(&image.rotation);
            let mut w2c = Matrix4::identity();
            for row in 0..3 {
                for col in 0..3 {
                    w2c[(row, col)] = rotation[row][col];
                }
                w2c[(row, 3)] = image.translation[row];
            }
            let c2w = w2c
                .try_inverse()
                .ok_or_else(|| DatasetError::SingularPose(image.name.clone()))?;
            camtoworlds.push(c2w);
            camera_ids.push(image.camera_id);
            camera_names.push(image.name.clone());

            let camera = camera_by_id
                .get(&image.camera_id)
                .ok_or(DatasetError::MissingCamera(image.camera_id))?;
            let (fx, fy, cx, cy) = pinhole_part(camera);
            let mut k = Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0);
            for col in 0..3 {
                k[(0, col)] /= factor as f64;
                k[(1, col)] /= factor as f64;
            }

            let (coeffs, model) = classify_camera(camera)?;
            intrinsics.insert(image.camera_id, k);
            distortion.insert(image.camera_id, coeffs);
            image_sizes.insert(image.camera_id, (camera.width / factor, camera.height / factor));
            models.insert(image.camera_id, model);
        }

        log::info!(
            "parsed {} images taken by {} cameras",
            images.len(),
            camera_by_id.len()
        );

        // images sorted by name define the global sample order
        let mut order = (0..camera_names.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| camera_names[a].cmp(&camera_names[b]));
        let camera_names = order
            .iter()
            .map(|&i| camera_names[i].clone())
            .collect::<Vec<_>>();
        let mut camtoworlds = order.iter().map(|&i| camtoworlds[i]).collect::<Vec<_>>();
        let camera_ids = order.iter().map(|&i| camera_ids[i]).collect::<Vec<_>>();

        let mut points = model_points
            .iter()
            .map(|p| p.xyz)
            .collect::<Vec<[f64; 3]>>();
        let points_err = model_points.iter().map(|p| p.error).collect::<Vec<_>>();
        let points_rgb = model_points.iter().map(|p| p.rgb).collect::<Vec<_>>();

        let name_by_image_id = images
            .iter()
            .map(|image| (image.image_id, image.name.clone()))
            .collect::<HashMap<_, _>>();
        let mut point_indices: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, point) in model_points.iter().enumerate() {
            for (image_id, _) in &point.track {
                if let Some(name) = name_by_image_id.get(image_id) {
                    point_indices.entry(name.clone()).or_default().push(index);
                }
            }
        }

        let transform = if normalize {
            let t1 = similarity_from_cameras(&camtoworlds);
            transform_cameras(&t1, &mut camtoworlds);
            transform_points(&t1, &mut points);

            let t2 = align_principal_axes(&points);
            transform_cameras(&t2, &mut camtoworlds);
            transform_points(&t2, &mut points);

            t2 * t1
        } else {
            Matrix4::identity()
        };

        let ext = match std::fs::read_to_string(data_dir.join("ext_metadata.json")) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(_) => ExtMetadata::default(),
        };

        let bounds_file = data_dir.join("poses_bounds.npy");
        let bounds = if bounds_file.is_file() {
            read_poses_bounds(&bounds_file)?.1
        } else {
            vec![[0.01, 1.0]]
        };

        // frame directories in sorted order; index is the camera index
        let png_dir = data_dir.join("png");
        let mut camera_paths = Vec::new();
        for entry in std::fs::read_dir(&png_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                camera_paths.push(entry.path());
            }
        }
        camera_paths.sort();

        // camera index i must name both the i-th sorted image and the i-th
        // sorted frame directory, so the counts have to line up
        if camera_paths.len() != camera_names.len() {
            return Err(DatasetError::CameraCountMismatch {
                images: camera_names.len(),
                directories: camera_paths.len(),
            });
        }

        // reconcile intrinsics with the actual frame resolution
        let sample_frame = camera_paths
            .first()
            .ok_or_else(|| DatasetError::ColmapDirNotFound(png_dir.clone()))?
            .join(format!("{:05}.png", first_frame + 1));
        let (actual_width, actual_height) = image::image_dimensions(&sample_frame)?;
        let actual_width = actual_width as usize / factor;
        let actual_height = actual_height as usize / factor;
        let (model_width, model_height) = image_sizes[&camera_ids[0]];
        let s_width = actual_width as f64 / model_width as f64;
        let s_height = actual_height as f64 / model_height as f64;
        for (camera_id, k) in intrinsics.iter_mut() {
            for col in 0..3 {
                k[(0, col)] *= s_width;
                k[(1, col)] *= s_height;
            }
            let (width, height) = image_sizes[camera_id];
            image_sizes.insert(
                *camera_id,
                (
                    (width as f64 * s_width) as usize,
                    (height as f64 * s_height) as usize,
                ),
            );
        }

        let mut calibrations = HashMap::new();
        let distorted_ids = distortion
            .iter()
            .filter(|(_, coeffs)| !coeffs.is_empty())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for camera_id in distorted_ids {
            let coeffs = &distortion[&camera_id];
            let dist = [coeffs[0], coeffs[1], coeffs[2], coeffs[3]];
            let k = intrinsics[&camera_id];
            let (width, height) = image_sizes[&camera_id];

            let record = match models[&camera_id] {
                DistortionModel::Perspective => {
                    let k_new = optimal_new_camera_matrix(&k, &dist, width, height);
                    let (map_x, map_y) = perspective_rectify_map(&k, &dist, &k_new, width, height);
                    intrinsics.insert(camera_id, k_new);
                    CalibrationRecord {
                        model: DistortionModel::Perspective,
                        map_x,
                        map_y,
                        roi: [0, 0, width, height],
                        mask: None,
                    }
                }
                DistortionModel::Fisheye => {
                    let maps = fisheye_rectify_map(&k, &dist, width, height, camera_id)?;
                    intrinsics.insert(camera_id, maps.k);
                    image_sizes.insert(camera_id, (maps.roi[2], maps.roi[3]));
                    CalibrationRecord {
                        model: DistortionModel::Fisheye,
                        map_x: maps.map_x,
                        map_y: maps.map_y,
                        roi: maps.roi,
                        mask: Some(maps.mask),
                    }
                }
            };
            calibrations.insert(camera_id, record);
        }

        let scene_scale = scene_scale(&camtoworlds);

        Ok(Self {
            data_dir,
            factor,
            camera_names,
            camera_paths,
            camtoworlds,
            camera_ids,
            intrinsics,
            distortion,
            image_sizes,
            calibrations,
            points,
            points_err,
            points_rgb,
            point_indices,
            transform,
            bounds,
            ext,
            scene_scale,
        })
    }
}
