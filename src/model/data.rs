/// Shared entity structs for the mosaic catalog
///
/// These structs mirror catalog rows one-to-one. The database layer owns
/// entity lifetime; in-memory values are plain copies of what was read,
/// never independently tracked.

use crate::model::pixels::Pixels;

/// An interned width:height ratio class.
///
/// Two images with proportional dimensions share one Aspect row.
/// `(columns, rows)` is unique in the catalog and immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aspect {
    /// Unique database ID
    pub id: i64,
    /// Width component of the reduced ratio
    pub columns: i64,
    /// Height component of the reduced ratio
    pub rows: i64,
}

impl Aspect {
    /// Reduce raw pixel dimensions to their smallest integer ratio.
    ///
    /// 800x600 and 4x3 both reduce to (4, 3), so proportional images
    /// intern to the same Aspect.
    pub fn calculate(width: i64, height: i64) -> (i64, i64) {
        let d = gcd(width.max(1), height.max(1));
        (width.max(1) / d, height.max(1) / d)
    }

    /// Width divided by height, as a float
    pub fn ratio(&self) -> f64 {
        self.columns as f64 / self.rows as f64
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// One indexed source image, keyed by content hash.
///
/// `width`/`height` are the visual extents: when `orientation` is 5-8 the
/// raw pixel bounds were swapped at index time, so these values already
/// reflect the post-orientation geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gidx {
    /// Unique database ID
    pub id: i64,
    /// Interned aspect of the visual extents
    pub aspect_id: i64,
    /// Full path to the image file
    pub path: String,
    /// SHA-256 of the file bytes, unique in the catalog
    pub sha256sum: String,
    /// Visual width in pixels
    pub width: i64,
    /// Visual height in pixels
    pub height: i64,
    /// EXIF-style orientation code, normalized to 1-8 (0 becomes 1)
    pub orientation: i64,
}

/// The target image being mosaic-ed, subdivided into cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    /// Unique database ID
    pub id: i64,
    /// Interned aspect of the full canvas
    pub aspect_id: i64,
    /// Unique human-readable name
    pub name: String,
    /// Canvas width in pixels
    pub width: i64,
    /// Canvas height in pixels
    pub height: i64,
    /// Unix timestamp of creation
    pub created_at: i64,
}

/// One rectangular tile of a cover's grid.
///
/// Cells are axis-aligned, non-overlapping, and together tile the cover
/// canvas exactly. Immutable once the grid is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverPartial {
    /// Unique database ID
    pub id: i64,
    /// Owning cover
    pub cover_id: i64,
    /// Interned aspect of this cell's rectangle
    pub aspect_id: i64,
    /// Left edge, inclusive
    pub x1: i64,
    /// Top edge, inclusive
    pub y1: i64,
    /// Right edge, exclusive
    pub x2: i64,
    /// Bottom edge, exclusive
    pub y2: i64,
}

impl CoverPartial {
    /// Cell width in pixels
    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    /// Cell height in pixels
    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    /// Top-left paste offset in the cover canvas
    pub fn point(&self) -> (i64, i64) {
        (self.x1, self.y1)
    }
}

/// The cover photo rendered at mosaic scale, ready for per-cell sampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroImage {
    /// Unique database ID
    pub id: i64,
    /// Interned aspect of the visual extents
    pub aspect_id: i64,
    /// Cover this macro was rendered for
    pub cover_id: i64,
    /// Full path to the image file
    pub path: String,
    /// SHA-256 of the file bytes
    pub sha256sum: String,
    /// Visual width in pixels
    pub width: i64,
    /// Visual height in pixels
    pub height: i64,
    /// EXIF-style orientation code, normalized to 1-8
    pub orientation: i64,
}

/// Perceptual signature of one macro region, keyed (macro, cover cell).
///
/// At most one row exists per (macro_id, cover_partial_id) pair; the
/// partial store enforces find-or-create atomicity.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroPartial {
    /// Unique database ID
    pub id: i64,
    /// Owning macro image
    pub macro_id: i64,
    /// Target cover cell
    pub cover_partial_id: i64,
    /// Aspect of the sample grid (the cell's aspect)
    pub aspect_id: i64,
    /// Decoded Lab sample grid; encoded to the data blob only at write time
    pub pixels: Pixels,
}

/// Perceptual signature of one source image for a target aspect.
///
/// At most one row exists per (gidx_id, aspect_id) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GidxPartial {
    /// Unique database ID
    pub id: i64,
    /// Owning source image
    pub gidx_id: i64,
    /// Target aspect the image was sampled for
    pub aspect_id: i64,
    /// Decoded Lab sample grid; encoded to the data blob only at write time
    pub pixels: Pixels,
}

/// One mosaic run over a macro image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mosaic {
    /// Unique database ID
    pub id: i64,
    /// Human-readable name
    pub name: String,
    /// Macro this mosaic resolves
    pub macro_id: i64,
    /// Unix timestamp of creation
    pub created_at: i64,
}

/// One resolved (cell, matched source) assignment of a mosaic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicPartial {
    /// Unique database ID
    pub id: i64,
    /// Owning mosaic
    pub mosaic_id: i64,
    /// The cell-side signature (carries the cover cell)
    pub macro_partial_id: i64,
    /// The matched source-side signature (carries the gidx)
    pub gidx_partial_id: i64,
}

/// A resolved assignment joined out to what the compositing engine needs:
/// the matched source image and the target cell geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicPartialView {
    pub gidx: Gidx,
    pub cover_partial: CoverPartial,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_calculate_reduces_by_gcd() {
        assert_eq!(Aspect::calculate(800, 600), (4, 3));
        assert_eq!(Aspect::calculate(4, 3), (4, 3));
        assert_eq!(Aspect::calculate(1920, 1080), (16, 9));
        assert_eq!(Aspect::calculate(100, 100), (1, 1));
        assert_eq!(Aspect::calculate(7, 13), (7, 13));
    }

    #[test]
    fn test_cover_partial_geometry() {
        let cell = CoverPartial {
            id: 1,
            cover_id: 1,
            aspect_id: 1,
            x1: 10,
            y1: 20,
            x2: 50,
            y2: 50,
        };
        assert_eq!(cell.width(), 40);
        assert_eq!(cell.height(), 30);
        assert_eq!(cell.point(), (10, 20));
    }
}
