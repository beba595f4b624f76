//! Persistent vector memory for AgentX.
//!
//! Records are embedded once, appended to an in-memory index, and written out
//! as a single JSON snapshot that `VectorMemoryStore::load` can rebuild from.

pub mod embedder;
pub mod error;
pub mod metric;
pub mod model;
pub mod policy;
pub mod store;

/// Embedding seam used by the store.
pub use embedder::TextEmbedder;
/// Memory error type.
pub use error::MemoryError;
/// Similarity metrics supported by the index.
pub use metric::SimilarityMetric;
/// Memory record model.
pub use model::{MemoryRecord, ScoredRecord};
/// Capture policy applied before write-back.
pub use policy::{CaptureFilter, MemoryCapturePolicy};
/// Vector index and durable store.
pub use store::{DEFAULT_SEED_TEXT, StoreOptions, VectorIndex, VectorMemoryStore};
