//! Append-only vector index with atomic snapshot persistence.

use crate::embedder::TextEmbedder;
use crate::error::MemoryError;
use crate::metric::SimilarityMetric;
use crate::model::{MemoryRecord, ScoredRecord};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Text of the record written into a brand new store.
pub const DEFAULT_SEED_TEXT: &str = "Initial AgentX memory.";

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_TEMP_FILE: &str = "index.json.tmp";
const SNAPSHOT_VERSION: u32 = 1;

/// Options applied when loading or creating a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Metric used for ranking; must match the snapshot's metric.
    pub metric: SimilarityMetric,
    /// Expected embedding width, checked against the snapshot when set.
    pub dimension: Option<usize>,
    /// Text of the single record seeded into a new store.
    pub seed_text: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            dimension: None,
            seed_text: DEFAULT_SEED_TEXT.to_string(),
        }
    }
}

/// On-disk snapshot layout.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimension: Option<usize>,
    metric: SimilarityMetric,
    records: Vec<MemoryRecord>,
}

/// All records plus the metadata needed to rank them.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    metric: SimilarityMetric,
    records: Vec<MemoryRecord>,
}

impl VectorIndex {
    /// Create an empty index. The first appended record fixes the dimension
    /// unless one is given here.
    pub fn new(metric: SimilarityMetric, dimension: Option<usize>) -> Self {
        Self {
            dimension,
            metric,
            records: Vec::new(),
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    /// Append a batch of records. Either every record is appended or none is.
    pub fn extend(&mut self, records: Vec<MemoryRecord>) -> Result<(), MemoryError> {
        let mut dimension = self.dimension;
        for record in &records {
            let expected = *dimension.get_or_insert(record.embedding.len());
            check_embedding(&record.embedding, expected)?;
        }
        self.dimension = dimension;
        self.records.extend(records);
        Ok(())
    }

    /// Rank records against `query`, best first, returning at most `k` hits.
    ///
    /// Equal scores keep insertion order, so earlier records win ties.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>, MemoryError> {
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension {
            check_embedding(query, expected)?;
        }
        let mut hits: Vec<ScoredRecord> = self
            .records
            .iter()
            .map(|record| ScoredRecord {
                score: self.metric.score(query, &record.embedding),
                record: record.clone(),
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension,
            metric: self.metric,
            records: self.records.clone(),
        }
    }

    fn from_snapshot(snapshot: Snapshot, options: &StoreOptions) -> Result<Self, MemoryError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MemoryError::StoreCorrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.metric != options.metric {
            return Err(MemoryError::StoreCorrupt(format!(
                "snapshot metric {} does not match configured metric {}",
                snapshot.metric, options.metric
            )));
        }
        if let (Some(expected), Some(actual)) = (options.dimension, snapshot.dimension)
            && expected != actual
        {
            return Err(MemoryError::StoreCorrupt(format!(
                "snapshot dimension {actual} does not match configured dimension {expected}"
            )));
        }
        if snapshot.dimension.is_none() && !snapshot.records.is_empty() {
            return Err(MemoryError::StoreCorrupt(
                "snapshot has records but no dimension".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (idx, record) in snapshot.records.iter().enumerate() {
            if !seen.insert(record.id) {
                return Err(MemoryError::StoreCorrupt(format!(
                    "duplicate record id {} at position {idx}",
                    record.id
                )));
            }
            if let Some(expected) = snapshot.dimension {
                check_embedding(&record.embedding, expected).map_err(|err| {
                    MemoryError::StoreCorrupt(format!("record {} ({}): {err}", idx, record.id))
                })?;
            }
        }

        Ok(Self {
            dimension: snapshot.dimension.or(options.dimension),
            metric: snapshot.metric,
            records: snapshot.records,
        })
    }
}

fn check_embedding(embedding: &[f32], expected: usize) -> Result<(), MemoryError> {
    if embedding.is_empty() {
        return Err(MemoryError::InvalidEmbedding("empty vector".to_string()));
    }
    if embedding.len() != expected {
        return Err(MemoryError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    if embedding.iter().any(|value| !value.is_finite()) {
        return Err(MemoryError::InvalidEmbedding(
            "vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Durable vector memory shared by every session.
pub struct VectorMemoryStore {
    /// Directory holding the snapshot.
    location: PathBuf,
    /// Embedding provider used by `add`.
    embedder: Arc<dyn TextEmbedder>,
    /// Live index.
    index: RwLock<VectorIndex>,
    /// Serializes snapshot writes.
    persist_lock: Mutex<()>,
}

impl std::fmt::Debug for VectorMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read();
        f.debug_struct("VectorMemoryStore")
            .field("location", &self.location)
            .field("records", &index.len())
            .field("dimension", &index.dimension())
            .field("metric", &index.metric())
            .finish()
    }
}

impl VectorMemoryStore {
    /// Create an empty, unpersisted store.
    pub fn empty(
        location: impl AsRef<Path>,
        embedder: Arc<dyn TextEmbedder>,
        metric: SimilarityMetric,
        dimension: Option<usize>,
    ) -> Self {
        Self::from_index(
            location.as_ref().to_path_buf(),
            embedder,
            VectorIndex::new(metric, dimension),
        )
    }

    fn from_index(location: PathBuf, embedder: Arc<dyn TextEmbedder>, index: VectorIndex) -> Self {
        Self {
            location,
            embedder,
            index: RwLock::new(index),
            persist_lock: Mutex::new(()),
        }
    }

    /// Load the snapshot under `location`, or create and persist a store
    /// seeded with `options.seed_text` when none exists.
    ///
    /// An existing snapshot must match the width of the vectors `embedder`
    /// produces now; otherwise loading fails with `StoreCorrupt`.
    pub async fn load(
        location: impl AsRef<Path>,
        embedder: Arc<dyn TextEmbedder>,
        options: StoreOptions,
    ) -> Result<Self, MemoryError> {
        let location = location.as_ref().to_path_buf();
        let path = location.join(SNAPSHOT_FILE);
        if path.exists() {
            let index = read_snapshot(&path, &options)?;
            if let Some(expected) = index.dimension() {
                let actual = embedder.embed_one(&options.seed_text).await?.len();
                if actual != expected {
                    return Err(MemoryError::StoreCorrupt(format!(
                        "{}: snapshot holds {expected}-wide vectors but the embedder produces {actual}-wide vectors",
                        path.display()
                    )));
                }
            }
            info!(
                "loaded memory snapshot (path={}, records={}, dimension={:?}, metric={})",
                path.display(),
                index.len(),
                index.dimension(),
                index.metric()
            );
            return Ok(Self::from_index(location, embedder, index));
        }

        info!(
            "no memory snapshot found, seeding new store (path={})",
            path.display()
        );
        let store = Self::from_index(
            location,
            embedder,
            VectorIndex::new(options.metric, options.dimension),
        );
        store.add(vec![options.seed_text]).await?;
        store.persist()?;
        Ok(store)
    }

    /// Embed `texts` and append the resulting records. Does not persist.
    pub async fn add(&self, texts: Vec<String>) -> Result<Vec<MemoryRecord>, MemoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.embedder.embed(texts.clone()).await?;
        if embeddings.len() != texts.len() {
            return Err(MemoryError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        let records: Vec<MemoryRecord> = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| MemoryRecord::new(text, embedding))
            .collect();

        let mut index = self.index.write();
        index.extend(records.clone())?;
        debug!(
            "appended memory records (added={}, total={})",
            records.len(),
            index.len()
        );
        Ok(records)
    }

    /// Rank stored records against an already embedded query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>, MemoryError> {
        self.index.read().search(query, k)
    }

    /// Write the current index as one snapshot via temp file and rename.
    pub fn persist(&self) -> Result<(), MemoryError> {
        let _guard = self.persist_lock.lock();
        // Captured under the persist lock so later writes always hold a superset.
        let snapshot = self.index.read().to_snapshot();
        fs::create_dir_all(&self.location)?;
        let path = self.snapshot_path();
        let temp_path = self.location.join(SNAPSHOT_TEMP_FILE);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            let bytes = serde_json::to_vec(&snapshot)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        debug!(
            "persisted memory snapshot (path={}, records={})",
            path.display(),
            snapshot.records.len()
        );
        Ok(())
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.location.join(SNAPSHOT_FILE)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.index.read().dimension()
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.index.read().metric()
    }

    /// Copy of every record in insertion order.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.index.read().records().to_vec()
    }
}

fn read_snapshot(path: &Path, options: &StoreOptions) -> Result<VectorIndex, MemoryError> {
    let contents = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&contents)
        .map_err(|err| MemoryError::StoreCorrupt(format!("{}: {err}", path.display())))?;
    VectorIndex::from_snapshot(snapshot, options)
}

#[cfg(test)]
mod tests {
    use super::{SNAPSHOT_FILE, StoreOptions, VectorIndex, VectorMemoryStore};
    use crate::{MemoryError, MemoryRecord, SimilarityMetric, TextEmbedder};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Embeds known words onto fixed axes; anything else lands on the last axis.
    struct AxisEmbedder;

    fn axis_vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; 4];
        let lower = text.to_lowercase();
        let axis = if lower.contains("apple") {
            0
        } else if lower.contains("river") {
            1
        } else if lower.contains("stone") {
            2
        } else {
            3
        };
        vector[axis] = 1.0;
        vector
    }

    #[async_trait]
    impl TextEmbedder for AxisEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
            Ok(texts.iter().map(|text| axis_vector(text)).collect())
        }
    }

    struct WideEmbedder;

    #[async_trait]
    impl TextEmbedder for WideEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
            Ok(texts.iter().map(|_| vec![1.0; 8]).collect())
        }
    }

    fn embedder() -> Arc<dyn TextEmbedder> {
        Arc::new(AxisEmbedder)
    }

    #[tokio::test]
    async fn load_seeds_and_persists_new_store() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("load");
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].text, super::DEFAULT_SEED_TEXT);
        assert!(temp.path().join(SNAPSHOT_FILE).exists());
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("load");
        store
            .add(vec!["apple pie".to_string(), "river bank".to_string()])
            .await
            .expect("add");
        store.persist().expect("persist");
        let before = store.records();

        let reloaded = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("reload");
        assert_eq!(reloaded.records(), before);
        assert_eq!(reloaded.dimension(), Some(4));
    }

    #[tokio::test]
    async fn add_without_persist_is_not_durable() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("load");
        store.add(vec!["stone wall".to_string()]).await.expect("add");
        assert_eq!(store.len(), 2);

        let reloaded = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("reload");
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn search_returns_self_at_rank_one() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::empty(temp.path(), embedder(), SimilarityMetric::Cosine, None);
        store
            .add(vec![
                "apple".to_string(),
                "river".to_string(),
                "stone".to_string(),
            ])
            .await
            .expect("add");
        let query = axis_vector("river");
        let hits = store.search(&query, 3).expect("search");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].record.text, "river");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn search_respects_k_and_breaks_ties_by_insertion_order() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::empty(temp.path(), embedder(), SimilarityMetric::Cosine, None);
        store
            .add(vec![
                "first misc".to_string(),
                "apple".to_string(),
                "second misc".to_string(),
                "third misc".to_string(),
            ])
            .await
            .expect("add");
        let query = axis_vector("misc");

        assert!(store.search(&query, 0).expect("k=0").is_empty());

        let hits = store.search(&query, 2).expect("search");
        let texts: Vec<&str> = hits.iter().map(|hit| hit.record.text.as_str()).collect();
        assert_eq!(texts, vec!["first misc", "second misc"]);

        let all = store.search(&query, 10).expect("search");
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].record.text, "apple");
    }

    #[tokio::test]
    async fn search_on_empty_store_is_empty() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::empty(temp.path(), embedder(), SimilarityMetric::Cosine, None);
        let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 4).expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn add_rejects_wrong_dimension_without_partial_append() {
        let temp = tempdir().expect("tempdir");
        let wide = VectorMemoryStore::empty(
            temp.path(),
            Arc::new(WideEmbedder),
            SimilarityMetric::Cosine,
            Some(4),
        );
        let err = wide
            .add(vec!["apple".to_string(), "river".to_string()])
            .await
            .expect_err("dimension mismatch");
        match err {
            MemoryError::DimensionMismatch { expected, actual } => {
                assert_eq!((expected, actual), (4, 8));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(wide.is_empty());
    }

    #[tokio::test]
    async fn load_rejects_snapshot_written_by_other_embedder_width() {
        let temp = tempdir().expect("tempdir");
        VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("seed");
        let before = std::fs::read(temp.path().join(SNAPSHOT_FILE)).expect("read");

        let err = VectorMemoryStore::load(temp.path(), Arc::new(WideEmbedder), StoreOptions::default())
            .await
            .expect_err("width change");
        assert!(matches!(err, MemoryError::StoreCorrupt(_)));
        let after = std::fs::read(temp.path().join(SNAPSHOT_FILE)).expect("read");
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn load_rejects_unparsable_snapshot() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join(SNAPSHOT_FILE), "{ not json").expect("write");
        let err = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect_err("corrupt");
        assert!(matches!(err, MemoryError::StoreCorrupt(_)));
    }

    #[tokio::test]
    async fn load_rejects_inconsistent_dimensions() {
        let temp = tempdir().expect("tempdir");
        let first = MemoryRecord::new("a", vec![1.0, 0.0]);
        let second = MemoryRecord::new("b", vec![1.0, 0.0, 0.0]);
        let snapshot = serde_json::json!({
            "version": 1,
            "dimension": 2,
            "metric": "cosine",
            "records": [first, second],
        });
        std::fs::write(temp.path().join(SNAPSHOT_FILE), snapshot.to_string()).expect("write");
        let err = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect_err("corrupt");
        assert!(matches!(err, MemoryError::StoreCorrupt(_)));
    }

    #[tokio::test]
    async fn load_rejects_configured_dimension_or_metric_mismatch() {
        let temp = tempdir().expect("tempdir");
        VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("seed");

        let options = StoreOptions {
            dimension: Some(1536),
            ..StoreOptions::default()
        };
        let err = VectorMemoryStore::load(temp.path(), embedder(), options)
            .await
            .expect_err("dimension");
        assert!(matches!(err, MemoryError::StoreCorrupt(_)));

        let options = StoreOptions {
            metric: SimilarityMetric::Dot,
            ..StoreOptions::default()
        };
        let err = VectorMemoryStore::load(temp.path(), embedder(), options)
            .await
            .expect_err("metric");
        assert!(matches!(err, MemoryError::StoreCorrupt(_)));
    }

    #[tokio::test]
    async fn persist_leaves_no_temp_file() {
        let temp = tempdir().expect("tempdir");
        let store = VectorMemoryStore::load(temp.path(), embedder(), StoreOptions::default())
            .await
            .expect("load");
        store.add(vec!["river".to_string()]).await.expect("add");
        store.persist().expect("persist");
        assert!(!temp.path().join(super::SNAPSHOT_TEMP_FILE).exists());
    }

    #[test]
    fn index_extend_fixes_dimension_from_first_record() {
        let mut index = VectorIndex::new(SimilarityMetric::Cosine, None);
        index
            .extend(vec![MemoryRecord::new("a", vec![0.5, 0.5])])
            .expect("extend");
        assert_eq!(index.dimension(), Some(2));

        let err = index
            .extend(vec![
                MemoryRecord::new("b", vec![1.0, 0.0]),
                MemoryRecord::new("c", vec![f32::NAN, 0.0]),
            ])
            .expect_err("nan");
        assert!(matches!(err, MemoryError::InvalidEmbedding(_)));
        assert_eq!(index.len(), 1);
    }
}
