//! Writes completed question/answer pairs back into durable memory.

use crate::error::AgentxCoreError;
use agentx_rs_memory::{CaptureFilter, MemoryRecord, VectorMemoryStore};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Text stored for a completed turn.
pub fn format_record(question: &str, answer: &str) -> String {
    format!("Question: {question}\nAnswer: {answer}")
}

pub struct MemoryWriter {
    store: Arc<VectorMemoryStore>,
    filter: CaptureFilter,
    embedding_timeout: Duration,
    persist_timeout: Duration,
    /// Held across add and persist so commits from different sessions never interleave.
    commit_gate: Mutex<()>,
}

impl MemoryWriter {
    pub fn new(
        store: Arc<VectorMemoryStore>,
        filter: CaptureFilter,
        embedding_timeout: Duration,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            filter,
            embedding_timeout,
            persist_timeout,
            commit_gate: Mutex::new(()),
        }
    }

    /// Append the formatted pair to the store and persist a fresh snapshot.
    ///
    /// Returns `None` when the capture policy refuses the record; nothing is
    /// written in that case.
    pub async fn commit(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<Option<MemoryRecord>, AgentxCoreError> {
        let formatted = format_record(question, answer);
        let Some(text) = self.filter.apply(&formatted) else {
            info!("memory capture skipped by policy (session_id={})", session_id);
            return Ok(None);
        };

        let _gate = self.commit_gate.lock().await;
        let added = tokio::time::timeout(self.embedding_timeout, self.store.add(vec![text]))
            .await
            .map_err(|_| AgentxCoreError::Timeout {
                operation: "embedding",
                timeout_ms: self.embedding_timeout.as_millis() as u64,
            })??;
        let record = added
            .into_iter()
            .next()
            .ok_or_else(|| AgentxCoreError::Executor("store returned no record".to_string()))?;

        let store = self.store.clone();
        let persist = tokio::task::spawn_blocking(move || store.persist());
        tokio::time::timeout(self.persist_timeout, persist)
            .await
            .map_err(|_| AgentxCoreError::Timeout {
                operation: "persist",
                timeout_ms: self.persist_timeout.as_millis() as u64,
            })?
            .map_err(|err| AgentxCoreError::Executor(err.to_string()))??;

        debug!(
            "memory committed (session_id={}, record_id={}, total={})",
            session_id,
            record.id,
            self.store.len()
        );
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryWriter, format_record};
    use agentx_rs_memory::{
        CaptureFilter, MemoryCapturePolicy, SimilarityMetric, StoreOptions, TextEmbedder,
        VectorMemoryStore,
    };
    use agentx_rs_test_utils::HashingEmbedder;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn writer(store: Arc<VectorMemoryStore>, policy: MemoryCapturePolicy) -> MemoryWriter {
        let filter = CaptureFilter::new(policy).expect("compile");
        MemoryWriter::new(store, filter, Duration::from_secs(5), Duration::from_secs(5))
    }

    #[test]
    fn record_format_pairs_question_and_answer() {
        assert_eq!(
            format_record("What is the capital of Portugal?", "Lisbon."),
            "Question: What is the capital of Portugal?\nAnswer: Lisbon."
        );
    }

    #[tokio::test]
    async fn commit_appends_and_persists() {
        let temp = tempdir().expect("tempdir");
        let embedder: Arc<dyn TextEmbedder> = Arc::new(HashingEmbedder::default());
        let store = Arc::new(
            VectorMemoryStore::load(temp.path(), embedder.clone(), StoreOptions::default())
                .await
                .expect("load"),
        );
        let record = writer(store.clone(), MemoryCapturePolicy::default())
            .commit("cli", "What is the capital of Portugal?", "Lisbon.")
            .await
            .expect("commit")
            .expect("record");
        assert_eq!(
            record.text,
            "Question: What is the capital of Portugal?\nAnswer: Lisbon."
        );

        let reloaded = VectorMemoryStore::load(temp.path(), embedder, StoreOptions::default())
            .await
            .expect("reload");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.records()[1], record);
    }

    #[tokio::test]
    async fn denied_commit_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let embedder = Arc::new(HashingEmbedder::default());
        let store = Arc::new(VectorMemoryStore::empty(
            temp.path(),
            embedder.clone(),
            SimilarityMetric::Cosine,
            None,
        ));
        let policy = MemoryCapturePolicy {
            deny_patterns: vec!["(?i)password".to_string()],
            ..MemoryCapturePolicy::default()
        };
        let committed = writer(store.clone(), policy)
            .commit("cli", "my password is hunter2", "noted")
            .await
            .expect("commit");
        assert_eq!(committed, None);
        assert!(store.is_empty());
        assert_eq!(embedder.call_count(), 0);
        assert!(!store.snapshot_path().exists());
    }
}
