use std::path::Path;

use image::{imageops, Rgb, RgbImage};
use ndarray::Array2;

use crate::error::DatasetError;

/// Decode an image file into 8-bit RGB, dropping any alpha channel.
pub fn read_image_rgb8(path: impl AsRef<Path>) -> Result<RgbImage, DatasetError> {
    Ok(image::open(path)?.to_rgb8())
}

/// Downscale an image by an integer factor with bilinear filtering.
///
/// A factor of 1 (or 0) returns the image unchanged.
pub fn resize_by_factor(image: RgbImage, factor: usize) -> RgbImage {
    if factor <= 1 {
        return image;
    }
    let width = image.width() / factor as u32;
    let height = image.height() / factor as u32;
    imageops::resize(&image, width, height, imageops::FilterType::Triangle)
}

/// Crop a rectangle out of an image.
pub fn crop(image: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> RgbImage {
    imageops::crop_imm(image, x, y, width, height).to_image()
}

fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = (image.width() as i64, image.height() as i64);

    let x0 = x.floor();
    let y0 = y.floor();
    let dx = x - x0;
    let dy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |xi: i64, yi: i64| -> [f32; 3] {
        if xi < 0 || yi < 0 || xi >= width || yi >= height {
            // out-of-bounds lookups read as black
            return [0.0; 3];
        }
        let p = image.get_pixel(xi as u32, yi as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - dx) + p10[c] * dx;
        let bottom = p01[c] * (1.0 - dx) + p11[c] * dx;
        out[c] = (top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Resample an image through per-pixel source lookup tables.
///
/// Destination pixel `(col, row)` takes the bilinear sample of the source at
/// `(map_x[row, col], map_y[row, col])`; lookups outside the source read as
/// black. The maps must share one shape, which becomes the output shape.
pub fn remap_bilinear(image: &RgbImage, map_x: &Array2<f32>, map_y: &Array2<f32>) -> RgbImage {
    debug_assert_eq!(map_x.dim(), map_y.dim());
    let (rows, cols) = map_x.dim();

    let mut out = RgbImage::new(cols as u32, rows as u32);
    for row in 0..rows {
        for col in 0..cols {
            let pixel = sample_bilinear(image, map_x[[row, col]], map_y[[row, col]]);
            out.put_pixel(col as u32, row as u32, pixel);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]))
    }

    #[test]
    fn identity_remap_reproduces_the_image() {
        let image = gradient_image(8, 6);
        let map_x = Array2::from_shape_fn((6, 8), |(_, col)| col as f32);
        let map_y = Array2::from_shape_fn((6, 8), |(row, _)| row as f32);

        let out = remap_bilinear(&image, &map_x, &map_y);
        assert_eq!(out, image);
    }

    #[test]
    fn out_of_bounds_lookups_are_black() {
        let image = gradient_image(4, 4);
        let map_x = Array2::from_elem((2, 2), -10.0);
        let map_y = Array2::from_elem((2, 2), -10.0);

        let out = remap_bilinear(&image, &map_x, &map_y);
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn remap_interpolates_between_neighbors() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([100, 100, 100]));

        let map_x = Array2::from_elem((1, 1), 0.5);
        let map_y = Array2::from_elem((1, 1), 0.0);
        let out = remap_bilinear(&image, &map_x, &map_y);
        assert_eq!(*out.get_pixel(0, 0), Rgb([50, 50, 50]));
    }

    #[test]
    fn resize_by_factor_halves_dimensions() {
        let image = gradient_image(8, 6);
        let out = resize_by_factor(image.clone(), 2);
        assert_eq!((out.width(), out.height()), (4, 3));
        assert_eq!(resize_by_factor(image.clone(), 1), image);
    }

    #[test]
    fn crop_takes_the_requested_rectangle() {
        let image = gradient_image(8, 6);
        let out = crop(&image, 2, 1, 3, 4);
        assert_eq!((out.width(), out.height()), (3, 4));
        assert_eq!(*out.get_pixel(0, 0), Rgb([2, 1, 0]));
    }
}
