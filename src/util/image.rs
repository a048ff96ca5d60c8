/// Image decode and geometry helpers
///
/// Everything the engines need from pixel data lives here: header probing,
/// EXIF orientation, crop-to-fill region extraction and canvas pasting.
/// The rest of the crate treats images purely as I/O.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageResult, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::model::data::{CoverPartial, Gidx};

/// Decode an image file
pub fn open(path: &Path) -> ImageResult<DynamicImage> {
    image::open(path)
}

/// Raw pixel bounds from the image header, without a full decode
pub fn dimensions(path: &Path) -> ImageResult<(u32, u32)> {
    image::image_dimensions(path)
}

/// Read the EXIF orientation tag (0x0112).
///
/// Returns 0 when the file has no EXIF data, no orientation tag, or the
/// probe fails outright; callers normalize 0 to the identity orientation.
/// A failed probe is never an error — the image is simply treated as
/// already upright.
pub fn read_orientation(path: &Path) -> u32 {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return 0,
    };
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(e) => e,
        Err(_) => return 0,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(0)
}

/// Map an absent orientation (0) to the identity code (1)
pub fn normalize_orientation(orientation: u32) -> u32 {
    if orientation == 0 {
        1
    } else {
        orientation
    }
}

/// Orientation codes 5-8 rotate by 90 or 270 degrees, so the visual
/// width/height are the raw bounds swapped.
pub fn swaps_extent(orientation: u32) -> bool {
    (5..=8).contains(&orientation)
}

/// Apply an EXIF orientation transform so the result is visually upright
pub fn fix_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Largest centered crop of `img` with the exact ratio columns:rows
pub fn crop_to_aspect(img: &DynamicImage, columns: u32, rows: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let scale = (width / columns).min(height / rows).max(1);
    let crop_width = (columns * scale).min(width);
    let crop_height = (rows * scale).min(height);
    let x = (width - crop_width) / 2;
    let y = (height - crop_height) / 2;
    img.crop_imm(x, y, crop_width, crop_height)
}

/// Extract the indexed image's pixels scaled and cropped to fill one
/// cover cell: upright the source, then resize-to-fill the cell's exact
/// width and height.
pub fn cover_partial_region(gidx: &Gidx, cover_partial: &CoverPartial) -> ImageResult<RgbaImage> {
    let img = open(Path::new(&gidx.path))?;
    let img = fix_orientation(img, gidx.orientation as u32);
    let tile = img.resize_to_fill(
        cover_partial.width() as u32,
        cover_partial.height() as u32,
        FilterType::Lanczos3,
    );
    Ok(tile.to_rgba8())
}

/// Paste a tile into the canvas at the given offset, replacing pixels
pub fn paste(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    imageops::replace(canvas, tile, x, y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba(color);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_normalize_orientation() {
        assert_eq!(normalize_orientation(0), 1);
        for code in 1..=8 {
            assert_eq!(normalize_orientation(code), code);
        }
    }

    #[test]
    fn test_swaps_extent_only_for_transposed_codes() {
        for code in [0, 1, 2, 3, 4] {
            assert!(!swaps_extent(code), "code {} must not swap", code);
        }
        for code in [5, 6, 7, 8] {
            assert!(swaps_extent(code), "code {} must swap", code);
        }
    }

    #[test]
    fn test_fix_orientation_transposes_rotated_codes() {
        for code in [5, 6, 7, 8] {
            let img = solid(4, 2, [255, 0, 0, 255]);
            let fixed = fix_orientation(img, code);
            assert_eq!((fixed.width(), fixed.height()), (2, 4));
        }
        let img = solid(4, 2, [255, 0, 0, 255]);
        let fixed = fix_orientation(img, 1);
        assert_eq!((fixed.width(), fixed.height()), (4, 2));
    }

    #[test]
    fn test_crop_to_aspect_shape() {
        let img = solid(100, 60, [0, 255, 0, 255]);
        let cropped = crop_to_aspect(&img, 1, 1);
        assert_eq!((cropped.width(), cropped.height()), (60, 60));

        let cropped = crop_to_aspect(&img, 4, 3);
        assert_eq!(cropped.width() * 3, cropped.height() * 4);
    }

    #[test]
    fn test_cover_partial_region_matches_cell_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        solid(64, 48, [10, 20, 30, 255]).save(&path).unwrap();

        let gidx = Gidx {
            id: 1,
            aspect_id: 1,
            path: path.to_string_lossy().to_string(),
            sha256sum: String::new(),
            width: 64,
            height: 48,
            orientation: 1,
        };
        let cell = CoverPartial {
            id: 1,
            cover_id: 1,
            aspect_id: 1,
            x1: 0,
            y1: 0,
            x2: 16,
            y2: 16,
        };

        let tile = cover_partial_region(&gidx, &cell).unwrap();
        assert_eq!((tile.width(), tile.height()), (16, 16));
        assert_eq!(tile.get_pixel(8, 8), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_paste_replaces_pixels() {
        let mut canvas = RgbaImage::new(8, 8);
        let tile = solid(4, 4, [1, 2, 3, 255]).to_rgba8();
        paste(&mut canvas, &tile, 4, 4);

        assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(canvas.get_pixel(5, 6), &Rgba([1, 2, 3, 255]));
    }
}
