use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use super::{CameraModelId, ColmapCamera, ColmapError, ColmapImage, ColmapPoint3d};

fn read_bytes<const N: usize>(reader: &mut impl Read) -> Result<[u8; N], ColmapError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u64(reader: &mut impl Read) -> Result<u64, ColmapError> {
    Ok(u64::from_le_bytes(read_bytes(reader)?))
}

fn read_i32(reader: &mut impl Read) -> Result<i32, ColmapError> {
    Ok(i32::from_le_bytes(read_bytes(reader)?))
}

fn read_f64(reader: &mut impl Read) -> Result<f64, ColmapError> {
    Ok(f64::from_le_bytes(read_bytes(reader)?))
}

fn read_null_terminated_string(reader: &mut impl Read) -> Result<String, ColmapError> {
    let mut bytes = Vec::new();
    loop {
        let [byte] = read_bytes::<1>(reader)?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).map_err(|e| ColmapError::ParseError(e.to_string()))
}

/// Read a `cameras.bin` file and return a vector of [`ColmapCamera`] structs.
///
/// Record layout (little endian): camera count as u64, then per camera the
/// id and model code as i32, width and height as u64 and the model's
/// parameters as f64.
pub fn read_cameras_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapCamera>, ColmapError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_cameras = read_u64(&mut reader)?;
    let mut cameras = Vec::with_capacity(num_cameras as usize);
    for _ in 0..num_cameras {
        let camera_id = read_i32(&mut reader)? as u32;
        let model_code = read_i32(&mut reader)?;
        let model_id = CameraModelId::from_code(model_code)
            .ok_or(ColmapError::InvalidCameraModel(model_code))?;
        let width = read_u64(&mut reader)? as usize;
        let height = read_u64(&mut reader)? as usize;
        let params = (0..model_id.num_params())
            .map(|_| read_f64(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;
        cameras.push(ColmapCamera {
            camera_id,
            model_id,
            width,
            height,
            params,
        });
    }

    Ok(cameras)
}

/// Read an `images.bin` file and return a vector of [`ColmapImage`] structs.
///
/// Record layout (little endian): image count as u64, then per image the id
/// as i32, the quaternion (w, x, y, z) and translation as f64, the camera id
/// as i32, the null-terminated name, and the observed 2d points as
/// (f64, f64, u64) with u64::MAX marking no 3d point.
pub fn read_images_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, ColmapError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_images = read_u64(&mut reader)?;
    let mut images = Vec::with_capacity(num_images as usize);
    for _ in 0..num_images {
        let image_id = read_i32(&mut reader)? as u32;
        let mut rotation = [0.0; 4];
        for q in rotation.iter_mut() {
            *q = read_f64(&mut reader)?;
        }
        let mut translation = [0.0; 3];
        for t in translation.iter_mut() {
            *t = read_f64(&mut reader)?;
        }
        let camera_id = read_i32(&mut reader)? as u32;
        let name = read_null_terminated_string(&mut reader)?;

        let num_points2d = read_u64(&mut reader)?;
        let mut points2d = Vec::with_capacity(num_points2d as usize);
        for _ in 0..num_points2d {
            let x = read_f64(&mut reader)?;
            let y = read_f64(&mut reader)?;
            let point3d_id = read_u64(&mut reader)? as i64;
            points2d.push((x, y, point3d_id));
        }

        images.push(ColmapImage {
            name,
            image_id,
            camera_id,
            rotation,
            translation,
            points2d,
        });
    }

    Ok(images)
}

/// Read a `points3D.bin` file and return a vector of [`ColmapPoint3d`] structs.
///
/// Record layout (little endian): point count as u64, then per point the id
/// as u64, xyz as f64, rgb as u8, the reprojection error as f64 and the
/// track as (i32 image id, i32 point2d index) pairs behind its u64 length.
pub fn read_points3d_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapPoint3d>, ColmapError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_points = read_u64(&mut reader)?;
    let mut points = Vec::with_capacity(num_points as usize);
    for _ in 0..num_points {
        let point3d_id = read_u64(&mut reader)?;
        let mut xyz = [0.0; 3];
        for v in xyz.iter_mut() {
            *v = read_f64(&mut reader)?;
        }
        let rgb = read_bytes::<3>(&mut reader)?;
        let error = read_f64(&mut reader)?;

        let track_len = read_u64(&mut reader)?;
        let mut track = Vec::with_capacity(track_len as usize);
        for _ in 0..track_len {
            let image_id = read_i32(&mut reader)? as u32;
            let point2d_idx = read_i32(&mut reader)? as u32;
            track.push((image_id, point2d_idx));
        }

        points.push(ColmapPoint3d {
            point3d_id,
            xyz,
            rgb,
            error,
            track,
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        (tmp, path)
    }

    #[test]
    fn read_cameras_bin_single_pinhole() -> Result<(), ColmapError> {
        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(1i32.to_le_bytes()); // camera_id
        bytes.extend(1i32.to_le_bytes()); // PINHOLE
        bytes.extend(640u64.to_le_bytes());
        bytes.extend(480u64.to_le_bytes());
        for p in [500.0f64, 500.0, 320.0, 240.0] {
            bytes.extend(p.to_le_bytes());
        }
        let (_tmp, path) = write_fixture(&bytes);

        let cameras = read_cameras_bin(&path)?;
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].camera_id, 1);
        assert_eq!(cameras[0].model_id, CameraModelId::Pinhole);
        assert_eq!(cameras[0].width, 640);
        assert_eq!(cameras[0].height, 480);
        assert_eq!(cameras[0].params, vec![500.0, 500.0, 320.0, 240.0]);
        Ok(())
    }

    #[test]
    fn read_cameras_bin_rejects_unknown_model() {
        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(1i32.to_le_bytes());
        bytes.extend(42i32.to_le_bytes());
        bytes.extend(640u64.to_le_bytes());
        bytes.extend(480u64.to_le_bytes());
        let (_tmp, path) = write_fixture(&bytes);

        let result = read_cameras_bin(&path);
        assert!(matches!(result, Err(ColmapError::InvalidCameraModel(42))));
    }

    #[test]
    fn read_images_bin_single_image() -> Result<(), ColmapError> {
        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(3i32.to_le_bytes()); // image_id
        for q in [1.0f64, 0.0, 0.0, 0.0] {
            bytes.extend(q.to_le_bytes());
        }
        for t in [0.5f64, -1.0, 2.0] {
            bytes.extend(t.to_le_bytes());
        }
        bytes.extend(2i32.to_le_bytes()); // camera_id
        bytes.extend(b"cam02.png\0");
        bytes.extend(2u64.to_le_bytes()); // two 2d points
        bytes.extend(10.0f64.to_le_bytes());
        bytes.extend(20.0f64.to_le_bytes());
        bytes.extend(7u64.to_le_bytes());
        bytes.extend(30.0f64.to_le_bytes());
        bytes.extend(40.0f64.to_le_bytes());
        bytes.extend(u64::MAX.to_le_bytes()); // unobserved
        let (_tmp, path) = write_fixture(&bytes);

        let images = read_images_bin(&path)?;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].image_id, 3);
        assert_eq!(images[0].camera_id, 2);
        assert_eq!(images[0].name, "cam02.png");
        assert_eq!(images[0].rotation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(images[0].translation, [0.5, -1.0, 2.0]);
        assert_eq!(images[0].points2d, vec![(10.0, 20.0, 7), (30.0, 40.0, -1)]);
        Ok(())
    }

    #[test]
    fn read_points3d_bin_single_point() -> Result<(), ColmapError> {
        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(9u64.to_le_bytes()); // point3d_id
        for v in [1.0f64, 2.0, 3.0] {
            bytes.extend(v.to_le_bytes());
        }
        bytes.extend([255u8, 128, 0]);
        bytes.extend(0.25f64.to_le_bytes());
        bytes.extend(2u64.to_le_bytes()); // track length
        bytes.extend(1i32.to_le_bytes());
        bytes.extend(0i32.to_le_bytes());
        bytes.extend(2i32.to_le_bytes());
        bytes.extend(5i32.to_le_bytes());
        let (_tmp, path) = write_fixture(&bytes);

        let points = read_points3d_bin(&path)?;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].point3d_id, 9);
        assert_eq!(points[0].xyz, [1.0, 2.0, 3.0]);
        assert_eq!(points[0].rgb, [255, 128, 0]);
        assert_eq!(points[0].error, 0.25);
        assert_eq!(points[0].track, vec![(1, 0), (2, 5)]);
        Ok(())
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(1i32.to_le_bytes());
        let (_tmp, path) = write_fixture(&bytes);

        let result = read_cameras_bin(&path);
        assert!(matches!(result, Err(ColmapError::IoError(_))));
    }
}
