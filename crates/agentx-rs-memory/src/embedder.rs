//! Embedding seam between the store and an external embedding provider.

use crate::error::MemoryError;
use async_trait::async_trait;

#[async_trait]
/// Maps text to fixed-width vectors.
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("embedder returned no vectors".to_string()))
    }
}
