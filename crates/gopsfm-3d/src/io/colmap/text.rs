use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use super::{CameraModelId, ColmapCamera, ColmapImage, ColmapPoint3d};

/// Error types for the COLMAP module.
#[derive(Debug, thiserror::Error)]
pub enum ColmapError {
    /// Error reading or writing a model file
    #[error("error reading or writing a model file")]
    IoError(#[from] std::io::Error),

    /// Unknown camera model code in a binary record
    #[error("unknown camera model code {0}")]
    InvalidCameraModel(i32),

    /// Parse error
    #[error("parse error {0}")]
    ParseError(String),
}

fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, ColmapError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| ColmapError::ParseError(format!("{}: {}", s, e)))
}

/// Lines of a model text file, with comment lines dropped.
fn data_lines(path: impl AsRef<Path>) -> Result<Vec<String>, ColmapError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines = reader
        .lines()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect();
    Ok(lines)
}

/// Read a `cameras.txt` file and return a vector of [`ColmapCamera`] structs.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapCamera>, ColmapError> {
    data_lines(path)?
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_camera_line(line))
        .collect()
}

/// Read a `points3D.txt` file and return a vector of [`ColmapPoint3d`] structs.
pub fn read_points3d_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapPoint3d>, ColmapError> {
    data_lines(path)?
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_point3d_line(line))
        .collect()
}

/// Read an `images.txt` file and return a vector of [`ColmapImage`] structs.
///
/// Each image record spans two lines; the second line lists the observed 2d
/// points and may be empty (the manual-prior seed writes it empty).
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, ColmapError> {
    data_lines(path)?
        .chunks(2)
        .filter(|chunk| !chunk[0].trim().is_empty())
        .map(|chunk| match chunk {
            [line1, line2] => parse_image_line(line1, line2),
            _ => Err(ColmapError::ParseError(
                "image record is missing its points line".to_string(),
            )),
        })
        .collect()
}

/// Parse a camera line.
/// NOTE: the number of parameters depends on the camera model.
///       CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[0], PARAMS[1], ...
fn parse_camera_line(line: &str) -> Result<ColmapCamera, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 5 {
        return Err(ColmapError::ParseError(format!(
            "invalid number of parts: {}",
            parts.len()
        )));
    }

    let model_id = CameraModelId::from_tag(parts[1])
        .ok_or_else(|| ColmapError::ParseError(format!("invalid camera model: {}", parts[1])))?;

    if parts.len() - 4 != model_id.num_params() {
        return Err(ColmapError::ParseError(format!(
            "{} camera has {} params, expected {}",
            model_id.tag(),
            parts.len() - 4,
            model_id.num_params()
        )));
    }

    Ok(ColmapCamera {
        camera_id: parse_part(parts[0])?,
        model_id,
        width: parse_part(parts[2])?,
        height: parse_part(parts[3])?,
        params: parts[4..]
            .iter()
            .map(|s| parse_part(s))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Parse a point3d line.
///       POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[0], TRACK[1], ...
fn parse_point3d_line(line: &str) -> Result<ColmapPoint3d, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 8 {
        return Err(ColmapError::ParseError(format!(
            "invalid number of parts: {}",
            parts.len()
        )));
    }

    Ok(ColmapPoint3d {
        point3d_id: parse_part(parts[0])?,
        xyz: [
            parse_part(parts[1])?,
            parse_part(parts[2])?,
            parse_part(parts[3])?,
        ],
        rgb: [
            parse_part(parts[4])?,
            parse_part(parts[5])?,
            parse_part(parts[6])?,
        ],
        error: parse_part(parts[7])?,
        track: parts[8..]
            .chunks_exact(2)
            .map(|chunk| -> Result<(u32, u32), ColmapError> {
                Ok((parse_part(chunk[0])?, parse_part(chunk[1])?))
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Parse an image record from its two lines.
///       IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
///       POINTS2D[] as (X, Y, POINT3D_ID)
fn parse_image_line(line1: &str, line2: &str) -> Result<ColmapImage, ColmapError> {
    let parts1 = line1.split_whitespace().collect::<Vec<_>>();
    let parts2 = line2.split_whitespace().collect::<Vec<_>>();

    if parts1.len() < 10 {
        return Err(ColmapError::ParseError(format!(
            "invalid number of parts: {}",
            parts1.len()
        )));
    }

    Ok(ColmapImage {
        image_id: parse_part(parts1[0])?,
        rotation: [
            parse_part(parts1[1])?,
            parse_part(parts1[2])?,
            parse_part(parts1[3])?,
            parse_part(parts1[4])?,
        ],
        translation: [
            parse_part(parts1[5])?,
            parse_part(parts1[6])?,
            parse_part(parts1[7])?,
        ],
        camera_id: parse_part(parts1[8])?,
        name: parts1[9].to_string(),
        points2d: parts2
            .chunks_exact(3)
            .map(|chunk| -> Result<(f64, f64, i64), ColmapError> {
                Ok((
                    parse_part(chunk[0])?,
                    parse_part(chunk[1])?,
                    parse_part(chunk[2])?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Write an `images.txt` file in the manual-prior format.
///
/// Every record is one pose line followed by its points line, which stays
/// empty for priors.
pub fn write_images_txt(
    path: impl AsRef<Path>,
    images: &[ColmapImage],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for image in images {
        let [qw, qx, qy, qz] = image.rotation;
        let [tx, ty, tz] = image.translation;
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {} {} {}",
            image.image_id, qw, qx, qy, qz, tx, ty, tz, image.camera_id, image.name
        )?;
        let points = image
            .points2d
            .iter()
            .map(|(x, y, id)| format!("{} {} {}", x, y, id))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", points)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a `cameras.txt` file.
pub fn write_cameras_txt(
    path: impl AsRef<Path>,
    cameras: &[ColmapCamera],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for camera in cameras {
        let params = camera
            .params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            writer,
            "{} {} {} {} {}",
            camera.camera_id,
            camera.model_id.tag(),
            camera.width,
            camera.height,
            params
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a `points3D.txt` file. An empty slice produces the empty
/// placeholder file of a manual-prior seed.
pub fn write_points3d_txt(
    path: impl AsRef<Path>,
    points: &[ColmapPoint3d],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for point in points {
        let track = point
            .track
            .iter()
            .map(|(image_id, idx)| format!("{} {}", image_id, idx))
            .collect::<Vec<_>>()
            .join(" ");
        let [x, y, z] = point.xyz;
        let [r, g, b] = point.rgb;
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {} {}",
            point.point3d_id, x, y, z, r, g, b, point.error, track
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_camera_line_pinhole() -> Result<(), ColmapError> {
        let camera = parse_camera_line("1 PINHOLE 640 480 500 500 320 240")?;
        assert_eq!(camera.camera_id, 1);
        assert_eq!(camera.model_id, CameraModelId::Pinhole);
        assert_eq!(camera.width, 640);
        assert_eq!(camera.height, 480);
        assert_eq!(camera.params, vec![500.0, 500.0, 320.0, 240.0]);
        Ok(())
    }

    #[test]
    fn parse_camera_line_rejects_unknown_model() {
        let result = parse_camera_line("1 MYSTERY 640 480 500");
        assert!(matches!(result, Err(ColmapError::ParseError(_))));
    }

    #[test]
    fn parse_camera_line_rejects_wrong_param_count() {
        // OPENCV carries 8 params, only 4 given
        let result = parse_camera_line("1 OPENCV 8 6 100 100 4 3");
        assert!(matches!(result, Err(ColmapError::ParseError(_))));

        // one param too many is rejected as well
        let result = parse_camera_line("1 PINHOLE 640 480 500 500 320 240 1");
        assert!(matches!(result, Err(ColmapError::ParseError(_))));
    }

    #[test]
    fn parse_image_record_with_empty_points_line() -> Result<(), ColmapError> {
        let image = parse_image_line("2 1 0 0 0 0.5 -1 2 2 cam01.png", "")?;
        assert_eq!(image.image_id, 2);
        assert_eq!(image.rotation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(image.translation, [0.5, -1.0, 2.0]);
        assert_eq!(image.camera_id, 2);
        assert_eq!(image.name, "cam01.png");
        assert!(image.points2d.is_empty());
        Ok(())
    }

    #[test]
    fn parse_point3d_line_with_track() -> Result<(), ColmapError> {
        let point = parse_point3d_line("7 1.0 2.0 3.0 255 0 0 0.5 1 0 2 4")?;
        assert_eq!(point.point3d_id, 7);
        assert_eq!(point.xyz, [1.0, 2.0, 3.0]);
        assert_eq!(point.rgb, [255, 0, 0]);
        assert_eq!(point.error, 0.5);
        assert_eq!(point.track, vec![(1, 0), (2, 4)]);
        Ok(())
    }

    #[test]
    fn manual_prior_files_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;

        let images = vec![ColmapImage {
            name: "cam00.png".to_string(),
            image_id: 1,
            camera_id: 1,
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [0.5, -1.0, 2.0],
            points2d: vec![],
        }];
        let cameras = vec![ColmapCamera {
            camera_id: 1,
            model_id: CameraModelId::Pinhole,
            width: 640,
            height: 480,
            params: vec![500.0, 500.0, 320.0, 240.0],
        }];

        let images_path = tmp.path().join("images.txt");
        let cameras_path = tmp.path().join("cameras.txt");
        let points_path = tmp.path().join("points3D.txt");
        write_images_txt(&images_path, &images)?;
        write_cameras_txt(&cameras_path, &cameras)?;
        write_points3d_txt(&points_path, &[])?;

        let images_back = read_images_txt(&images_path)?;
        assert_eq!(images_back.len(), 1);
        assert_eq!(images_back[0].name, "cam00.png");
        assert_eq!(images_back[0].rotation, [1.0, 0.0, 0.0, 0.0]);

        let cameras_back = read_cameras_txt(&cameras_path)?;
        assert_eq!(cameras_back.len(), 1);
        assert_eq!(cameras_back[0].params, cameras[0].params);

        assert!(read_points3d_txt(&points_path)?.is_empty());
        assert_eq!(std::fs::metadata(&points_path)?.len(), 0);
        Ok(())
    }
}
