/// Batched, cancellable compositing engine
///
/// Pages through a mosaic's resolved assignments in ascending id order
/// and pastes each matched source region into one output canvas. Pure
/// forward pagination: each batch asks for "the next 100 after N drawn",
/// no cursor survives between batches. Cancellation is polled once per
/// batch, so an in-flight batch always finishes.

use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::db::Database;
use crate::service::cover::CoverService;
use crate::service::macro_image::MacroService;
use crate::service::mosaic::{MosaicPartialService, MosaicService};
use crate::service::ServiceError;

/// Assignments fetched per page
const BATCH_SIZE: i64 = 100;

/// The three failure shapes of a draw, kept distinct: cancellation is not
/// an I/O failure, and neither is a dangling reference in the catalog.
#[derive(Debug, Error)]
pub enum DrawError {
    /// The caller requested cancellation; observed at a batch boundary
    #[error("draw cancelled")]
    Cancelled,

    /// The mosaic or one of its parents does not exist
    #[error("{what} id {id} does not exist")]
    NotFound { what: &'static str, id: i64 },

    /// Reading the source region for one cell failed; the draw aborts
    #[error("reading tile for cell {cell_id}: {source}")]
    Tile {
        cell_id: i64,
        #[source]
        source: image::ImageError,
    },

    /// Writing the finished canvas failed
    #[error("writing mosaic image {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A catalog query failed mid-draw
    #[error(transparent)]
    Store(#[from] ServiceError),
}

pub struct Renderer {
    covers: CoverService,
    macros: MacroService,
    mosaics: MosaicService,
    assignments: MosaicPartialService,
}

impl Renderer {
    pub fn new(db: Arc<Database>) -> Self {
        Renderer {
            covers: CoverService::new(Arc::clone(&db)),
            macros: MacroService::new(Arc::clone(&db)),
            mosaics: MosaicService::new(Arc::clone(&db)),
            assignments: MosaicPartialService::new(db),
        }
    }

    /// Composite `mosaic_id` into `outfile`.
    ///
    /// `progress` receives the running count after every pasted
    /// assignment; ticks are strictly monotonic. Setting `cancel` stops
    /// the draw at the next batch boundary with `DrawError::Cancelled`.
    /// Zero resolved assignments is a success: the untouched transparent
    /// canvas at the cover's dimensions is still written.
    pub fn draw(
        &self,
        mosaic_id: i64,
        outfile: &Path,
        cancel: &AtomicBool,
        mut progress: impl FnMut(i64),
    ) -> Result<i64, DrawError> {
        let mosaic = self
            .mosaics
            .get(mosaic_id)?
            .ok_or(DrawError::NotFound { what: "mosaic", id: mosaic_id })?;
        let macro_image = self
            .macros
            .get(mosaic.macro_id)?
            .ok_or(DrawError::NotFound { what: "macro", id: mosaic.macro_id })?;
        let cover = self
            .covers
            .get(macro_image.cover_id)?
            .ok_or(DrawError::NotFound { what: "cover", id: macro_image.cover_id })?;

        let total = self.assignments.count(mosaic.id)?;
        println!("🧩 Drawing {} mosaic partials...", total);

        // zeroed pixels are fully transparent
        let mut canvas = RgbaImage::new(cover.width as u32, cover.height as u32);
        let mut drawn: i64 = 0;

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(DrawError::Cancelled);
            }

            let views = self
                .assignments
                .find_all_views(mosaic.id, BATCH_SIZE, drawn)?;
            if views.is_empty() {
                break;
            }

            for view in &views {
                let tile = crate::util::image::cover_partial_region(&view.gidx, &view.cover_partial)
                    .map_err(|source| DrawError::Tile {
                        cell_id: view.cover_partial.id,
                        source,
                    })?;
                let (x, y) = view.cover_partial.point();
                crate::util::image::paste(&mut canvas, &tile, x, y);
                drawn += 1;
                progress(drawn);
            }
        }

        canvas.save(outfile).map_err(|source| DrawError::Save {
            path: outfile.to_path_buf(),
            source,
        })?;

        println!("🧩 Wrote mosaic image: {}", outfile.display());
        Ok(drawn)
    }
}
