/// Collaborator utilities
///
/// This module holds the pixel-level collaborators the engines depend on:
/// - Content hashing for duplicate detection (hash.rs)
/// - Image decode, orientation probing, crop and paste (image.rs)
/// - Lab sample-grid extraction for perceptual signatures (color.rs)

pub mod color;
pub mod hash;
pub mod image;
