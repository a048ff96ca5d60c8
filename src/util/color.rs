/// Perceptual color sampling
///
/// A signature reduces an image region to a columns x rows grid of
/// averaged colors, converted to CIE Lab so that numeric distance tracks
/// perceived difference. Averaging happens in sRGB per grid cell; only
/// the cell mean is converted.

use image::DynamicImage;
use palette::{FromColor, Srgb};
use std::path::Path;

use crate::model::data::{Aspect, CoverPartial, Gidx, MacroImage};
use crate::model::pixels::{Lab, Pixels};
use crate::util::image as image_util;

/// Average `img` into a columns x rows Lab sample grid
pub fn sample_lab_grid(img: &DynamicImage, columns: u32, rows: u32) -> Pixels {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut samples = Vec::with_capacity((columns * rows) as usize);

    for row in 0..rows {
        for col in 0..columns {
            let x_start = col * width / columns;
            let x_end = ((col + 1) * width / columns).max(x_start + 1).min(width);
            let y_start = row * height / rows;
            let y_end = ((row + 1) * height / rows).max(y_start + 1).min(height);

            let mut sum = [0.0f64; 3];
            let mut count = 0u64;
            for y in y_start..y_end {
                for x in x_start..x_end {
                    let pixel = rgb.get_pixel(x, y);
                    sum[0] += pixel[0] as f64;
                    sum[1] += pixel[1] as f64;
                    sum[2] += pixel[2] as f64;
                    count += 1;
                }
            }

            // a grid wider than the region yields empty cells; sample black
            let mean = if count == 0 {
                [0.0, 0.0, 0.0]
            } else {
                [
                    sum[0] / count as f64,
                    sum[1] / count as f64,
                    sum[2] / count as f64,
                ]
            };

            samples.push(srgb_to_lab(mean));
        }
    }

    Pixels::new(columns as i64, rows as i64, samples)
}

fn srgb_to_lab(mean: [f64; 3]) -> Lab {
    let srgb = Srgb::new(
        (mean[0] / 255.0) as f32,
        (mean[1] / 255.0) as f32,
        (mean[2] / 255.0) as f32,
    );
    let lab = palette::Lab::from_color(srgb.into_linear());
    Lab {
        l: lab.l as f64,
        a: lab.a as f64,
        b: lab.b as f64,
    }
}

/// Signature of the macro region under one cover cell: crop the macro to
/// the cell's rectangle, sample at the cell's aspect grid.
pub fn partial_lab(
    macro_image: &MacroImage,
    cover_partial: &CoverPartial,
    aspect: &Aspect,
) -> image::ImageResult<Pixels> {
    let img = image_util::open(Path::new(&macro_image.path))?;
    let img = image_util::fix_orientation(img, macro_image.orientation as u32);
    let region = img.crop_imm(
        cover_partial.x1 as u32,
        cover_partial.y1 as u32,
        cover_partial.width() as u32,
        cover_partial.height() as u32,
    );
    Ok(sample_lab_grid(
        &region,
        aspect.columns as u32,
        aspect.rows as u32,
    ))
}

/// Signature of a whole indexed image for a target aspect: center-crop to
/// the aspect ratio, sample at the aspect grid.
pub fn aspect_lab(gidx: &Gidx, aspect: &Aspect) -> image::ImageResult<Pixels> {
    let img = image_util::open(Path::new(&gidx.path))?;
    let img = image_util::fix_orientation(img, gidx.orientation as u32);
    let region = image_util::crop_to_aspect(&img, aspect.columns as u32, aspect.rows as u32);
    Ok(sample_lab_grid(
        &region,
        aspect.columns as u32,
        aspect.rows as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba(color);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_sample_grid_shape() {
        let img = solid(40, 30, [128, 128, 128, 255]);
        let pixels = sample_lab_grid(&img, 4, 3);
        assert_eq!(pixels.columns, 4);
        assert_eq!(pixels.rows, 3);
        assert_eq!(pixels.samples.len(), 12);
    }

    #[test]
    fn test_white_and_black_extremes() {
        let white = sample_lab_grid(&solid(8, 8, [255, 255, 255, 255]), 1, 1);
        let black = sample_lab_grid(&solid(8, 8, [0, 0, 0, 255]), 1, 1);

        assert!((white.samples[0].l - 100.0).abs() < 0.5);
        assert!(black.samples[0].l.abs() < 0.5);
    }

    #[test]
    fn test_half_and_half_grid_separates_colors() {
        // left half red, right half blue
        let mut img = RgbaImage::new(8, 4);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = if x < 4 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            };
        }
        let pixels = sample_lab_grid(&DynamicImage::ImageRgba8(img), 2, 1);

        // red has positive a*, blue has strongly negative b*
        assert!(pixels.samples[0].a > 40.0);
        assert!(pixels.samples[1].b < -40.0);
    }

    #[test]
    fn test_same_region_same_signature() {
        let img = solid(20, 20, [90, 140, 200, 255]);
        let first = sample_lab_grid(&img, 2, 2);
        let second = sample_lab_grid(&img, 2, 2);
        assert_eq!(first.dist(&second), 0.0);
    }
}
