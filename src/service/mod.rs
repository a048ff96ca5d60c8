/// Persistence services
///
/// One service per entity family, each owning its SQL and row mapping:
/// - Aspect interning (aspect.rs)
/// - The content index and per-image signatures (gidx.rs)
/// - Covers and their cell grids (cover.rs)
/// - Macro images and the macro-partial signature store (macro_image.rs)
/// - Resolved mosaics and their assignment views (mosaic.rs)
///
/// All mutations serialize through the catalog connection lock.
/// Find-or-create sequences additionally hold a per-service mutex so two
/// racing callers for the same key never both compute and insert.

pub mod aspect;
pub mod cover;
pub mod gidx;
pub mod macro_image;
pub mod mosaic;

use thiserror::Error;

/// Failures a service can surface to its caller
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The underlying catalog query failed
    #[error("catalog query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// A signature payload would not encode or decode
    #[error("signature payload codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// Reading pixel data for a signature failed
    #[error("image read failed: {0}")]
    Image(#[from] image::ImageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
