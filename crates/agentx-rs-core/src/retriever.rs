//! Embeds a standalone query and ranks memory records against it.

use crate::error::AgentxCoreError;
use agentx_rs_memory::{ScoredRecord, TextEmbedder, VectorMemoryStore};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

pub struct Retriever {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<VectorMemoryStore>,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        store: Arc<VectorMemoryStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            timeout,
        }
    }

    /// Up to `k` records ordered exactly as the store ranks them.
    pub async fn retrieve(
        &self,
        standalone_query: &str,
        k: usize,
    ) -> Result<Vec<ScoredRecord>, AgentxCoreError> {
        let query = tokio::time::timeout(self.timeout, self.embedder.embed_one(standalone_query))
            .await
            .map_err(|_| AgentxCoreError::Timeout {
                operation: "embedding",
                timeout_ms: self.timeout.as_millis() as u64,
            })??;
        let hits = self.store.search(&query, k)?;
        debug!(
            "retrieved memory (k={}, hits={}, top_score={:?})",
            k,
            hits.len(),
            hits.first().map(|hit| hit.score)
        );
        Ok(hits)
    }
}
