use image::RgbImage;
use nalgebra::{Matrix3, Matrix4};
use ndarray::Array2;
use rand::Rng;

use crate::error::DatasetError;
use crate::imageops::{crop, read_image_rgb8, remap_bilinear, resize_by_factor};
use crate::parser::Parser;

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Training samples.
    Train,
    /// Held-out samples.
    Test,
}

/// Configuration of a [`Dataset`] over one parsed scene.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Which split the dataset serves.
    pub split: Split,
    /// Side length of the optional uniformly-random patch crop.
    pub patch_size: Option<usize>,
    /// First frame of the group of pictures.
    pub start_frame: usize,
    /// Number of frames in the group of pictures.
    pub gop_size: usize,
    /// Camera indices held out for the test split.
    pub test_set: Vec<usize>,
    /// Camera indices excluded from both splits.
    pub remove_set: Vec<usize>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            split: Split::Train,
            patch_size: None,
            start_frame: 0,
            gop_size: 50,
            test_set: vec![0],
            remove_set: vec![],
        }
    }
}

/// One `(camera, frame)` sample.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Intrinsics, undistorted and crop-adjusted.
    pub k: Matrix3<f64>,
    /// Camera-to-world matrix; constant across the group of pictures.
    pub camtoworld: Matrix4<f64>,
    /// Decoded frame after resize, undistortion and crops.
    pub image: RgbImage,
    /// Index of the sample within the dataset.
    pub image_id: usize,
    /// Normalized time of the frame within the group, in `[0, 1]`.
    pub time: f64,
    /// Zero-based camera id; `None` outside the training split.
    pub camera_id: Option<u32>,
    /// Validity mask of the undistorted image, when one exists.
    pub mask: Option<Array2<bool>>,
}

/// Indexable view over the `(camera, frame)` grid of one group of pictures.
///
/// Accesses are read-only over the shared parser state and decode the frame
/// on every call; there is no caching.
#[derive(Debug)]
pub struct Dataset<'a> {
    parser: &'a Parser,
    config: DatasetConfig,
    indices: Vec<usize>,
}

impl<'a> Dataset<'a> {
    /// Build the index list of one split.
    ///
    /// The full index space is `0..num_cameras * gop_size`; index `i` belongs
    /// to the test split iff its camera `i / gop_size` is in `test_set`, and
    /// cameras in `remove_set` are dropped from both splits.
    pub fn new(parser: &'a Parser, config: DatasetConfig) -> Self {
        let total = parser.camera_names.len() * config.gop_size;
        let indices = (0..total)
            .filter(|i| {
                let camera = i / config.gop_size;
                let in_test = config.test_set.contains(&camera);
                let selected = match config.split {
                    Split::Train => !in_test,
                    Split::Test => in_test,
                };
                selected && !config.remove_set.contains(&camera)
            })
            .collect();
        Self {
            parser,
            config,
            indices,
        }
    }

    /// Number of samples in the split.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the split is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The `(camera, frame)` pair of a sample index.
    fn locate(&self, item: usize) -> Result<(usize, usize), DatasetError> {
        let selected = *self
            .indices
            .get(item)
            .ok_or(DatasetError::IndexOutOfBounds {
                index: item,
                len: self.indices.len(),
            })?;
        let camera = selected / self.config.gop_size;
        let frame = self.config.start_frame + selected % self.config.gop_size;
        Ok((camera, frame))
    }

    /// Load one sample.
    ///
    /// Decodes `png/<camera>/{frame+1:05}.png`, downscales it by the parser
    /// factor, undistorts and crops it when the camera carries distortion and
    /// applies the optional random patch crop, shifting the principal point
    /// accordingly.
    pub fn get(&self, item: usize) -> Result<Sample, DatasetError> {
        let (camera, frame) = self.locate(item)?;
        let camera_id = self.parser.camera_ids[camera];

        let path = self.parser.camera_paths[camera].join(format!("{:05}.png", frame + 1));
        let decoded = read_image_rgb8(&path)?;
        let mut image = resize_by_factor(decoded, self.parser.factor);

        let mut k = self.parser.intrinsics[&camera_id];
        let camtoworld = self.parser.camtoworlds[camera];
        let mut mask = None;

        if !self.parser.distortion[&camera_id].is_empty() {
            let record = &self.parser.calibrations[&camera_id];
            image = remap_bilinear(&image, &record.map_x, &record.map_y);
            let [x, y, width, height] = record.roi;
            image = crop(&image, x as u32, y as u32, width as u32, height as u32);
            mask = record.mask.clone();
        }

        if let Some(patch_size) = self.config.patch_size {
            let (width, height) = (image.width() as usize, image.height() as usize);
            let mut rng = rand::rng();
            let x = rng.random_range(0..(width.saturating_sub(patch_size)).max(1));
            let y = rng.random_range(0..(height.saturating_sub(patch_size)).max(1));
            image = crop(
                &image,
                x as u32,
                y as u32,
                patch_size.min(width) as u32,
                patch_size.min(height) as u32,
            );
            k[(0, 2)] -= x as f64;
            k[(1, 2)] -= y as f64;
        }

        let time = if self.config.gop_size > 1 {
            (frame - self.config.start_frame) as f64 / (self.config.gop_size - 1) as f64
        } else {
            0.0
        };

        Ok(Sample {
            k,
            camtoworld,
            image,
            image_id: item,
            time,
            camera_id: match self.config.split {
                // ids count from 1; an out-of-convention id 0 stays hidden
                Split::Train => camera_id.checked_sub(1),
                Split::Test => None,
            },
            mask,
        })
    }
}
