/// mosaicize — a photo-mosaic engine
///
/// The crate is organized in layers:
/// - Entity structs and signature payloads (model/)
/// - The SQLite catalog and its schema migrations (db/)
/// - Persistence services, one per entity family (service/)
/// - The indexing pipeline and the compositing engine (pipeline/)
/// - Pixel, hash and color collaborators (util/)
///
/// A typical run indexes a photo library into the catalog, signatures
/// each candidate in CIE Lab, and composites the resolved mosaic into
/// a single output image.

pub mod db;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod util;
