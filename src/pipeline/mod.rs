/// Engine module
///
/// The two long-running engines of the system:
/// - The bounded-concurrency indexing pipeline (index.rs)
/// - The batched, cancellable compositing engine (draw.rs)
///
/// Both fan work out for computation and funnel every catalog mutation
/// through the serialized service layer.

pub mod draw;
pub mod index;
