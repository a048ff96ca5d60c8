/// Data model module
///
/// This module holds the catalog entities and the signature payload:
/// - Entity structs shared between the database layer and the engines (data.rs)
/// - The Lab pixel-grid signature with its encode/decode boundary (pixels.rs)

pub mod data;
pub mod pixels;
