//! Conversation engine: drives one turn through reformulation, retrieval,
//! synthesis and memory write-back.

use crate::error::AgentxCoreError;
use crate::llm::{LanguageModel, LlmEmbedder};
use crate::reformulate::QueryReformulator;
use crate::retriever::Retriever;
use crate::sessions::SessionHistoryManager;
use crate::state::{JsonlStateStore, StateStore};
use crate::synthesizer::{AnswerSynthesizer, SynthesisPrompts};
use crate::types::{Role, SessionHistory, SessionSummary, TurnOutcome, TurnPhase};
use crate::writer::MemoryWriter;
use agentx_rs_config::{AgentxConfig, MemoryCaptureConfig, MemoryMetric, SessionsConfig};
use agentx_rs_memory::{
    CaptureFilter, MemoryCapturePolicy, MemoryError, SimilarityMetric, StoreOptions, TextEmbedder,
    VectorMemoryStore,
};
use autoagents_llm::LLMProvider;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SESSIONS_DIR: &str = ".agentx/sessions";

/// Builder for [`ConversationEngine`].
pub struct ConversationEngineBuilder {
    config: AgentxConfig,
    chat: Option<Arc<dyn LLMProvider>>,
    embedder: Option<Arc<dyn TextEmbedder>>,
    root: Option<PathBuf>,
    state_store: Option<Arc<dyn StateStore>>,
}

impl ConversationEngineBuilder {
    fn new(config: AgentxConfig) -> Self {
        Self {
            config,
            chat: None,
            embedder: None,
            root: None,
            state_store: None,
        }
    }

    /// Provider used for reformulation and answer synthesis.
    pub fn chat_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.chat = Some(provider);
        self
    }

    /// Provider whose embedding endpoint vectorizes queries and records.
    pub fn embedding_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.embedder = Some(Arc::new(LlmEmbedder::new(provider)));
        self
    }

    /// Use an embedder directly instead of an `LLMProvider`.
    pub fn embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Directory that relative memory and session paths resolve against.
    /// Defaults to the current working directory.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Override the transcript store used when sessions are enabled.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Load the memory store and assemble the engine.
    pub async fn build(self) -> Result<ConversationEngine, AgentxCoreError> {
        let chat = self
            .chat
            .ok_or_else(|| AgentxCoreError::Executor("chat provider is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| AgentxCoreError::Executor("embedder is required".to_string()))?;
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let config = self.config;
        config.validate()?;
        let capture = CaptureFilter::new(capture_policy_from_config(&config.memory.capture))
            .map_err(AgentxCoreError::Memory)?;

        let state_store = if config.sessions.enabled {
            match self.state_store {
                Some(store) => Some(store),
                None => Some(build_default_state_store(&root, &config.sessions)?),
            }
        } else {
            None
        };

        let memory_path = resolve_path(&root, &config.memory.path);
        let options = StoreOptions {
            metric: metric_from_config(config.memory.metric),
            dimension: config.memory.dimension,
            seed_text: config.memory.seed_text.clone(),
        };
        let embedding_timeout = Duration::from_millis(config.timeouts.embedding_ms);
        let store = tokio::time::timeout(
            embedding_timeout,
            VectorMemoryStore::load(&memory_path, embedder.clone(), options),
        )
        .await
        .map_err(|_| {
            AgentxCoreError::StoreLoad(MemoryError::Embedding(format!(
                "memory load timed out after {} ms",
                config.timeouts.embedding_ms
            )))
        })?
        .map_err(AgentxCoreError::StoreLoad)?;
        let store = Arc::new(store);
        info!(
            "conversation engine ready (memory={}, records={}, sessions_persisted={})",
            memory_path.display(),
            store.len(),
            state_store.is_some()
        );

        let model = LanguageModel::new(chat, Duration::from_millis(config.timeouts.llm_ms));
        let window = config.sessions.history_window;
        Ok(ConversationEngine {
            sessions: SessionHistoryManager::new(state_store),
            reformulator: QueryReformulator::new(
                model.clone(),
                config.prompts.reformulate.clone(),
                window,
            ),
            retriever: Retriever::new(embedder, store.clone(), embedding_timeout),
            synthesizer: AnswerSynthesizer::new(
                model,
                SynthesisPrompts {
                    answer: config.prompts.answer.clone(),
                    no_context: config.prompts.no_context.clone(),
                    min_context_score: config.prompts.min_context_score,
                },
                window,
            ),
            writer: MemoryWriter::new(
                store.clone(),
                capture,
                embedding_timeout,
                Duration::from_millis(config.timeouts.persist_ms),
            ),
            store,
            recall_k: config.memory.recall_k,
            turn_locks: Mutex::new(HashMap::new()),
        })
    }
}

/// Session-scoped retrieval engine sharing one durable memory store.
///
/// Turns for the same session run one at a time; turns for different
/// sessions may run concurrently.
pub struct ConversationEngine {
    sessions: SessionHistoryManager,
    reformulator: QueryReformulator,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    writer: MemoryWriter,
    store: Arc<VectorMemoryStore>,
    recall_k: usize,
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn builder(config: AgentxConfig) -> ConversationEngineBuilder {
        ConversationEngineBuilder::new(config)
    }

    /// Run a full turn for `session_id`.
    ///
    /// A failure before `CommittingMemory` leaves the durable store untouched.
    /// Dropping the returned future cancels the turn.
    pub async fn run_turn(
        &self,
        session_id: &str,
        raw_query: &str,
    ) -> Result<TurnOutcome, AgentxCoreError> {
        if raw_query.trim().is_empty() {
            return Err(AgentxCoreError::Executor("query is empty".to_string()));
        }
        let turn_lock = self.turn_lock(session_id);
        let _turn = turn_lock.lock().await;
        info!(
            "starting turn (session_id={}, query_len={})",
            session_id,
            raw_query.len()
        );

        let result = self.execute(session_id, raw_query).await;
        enter(session_id, TurnPhase::Idle);
        match &result {
            Ok(outcome) => info!(
                "turn finished (session_id={}, documents={}, committed={})",
                session_id,
                outcome.documents.len(),
                outcome.committed.is_some()
            ),
            Err(err) => warn!("turn failed (session_id={}, error={})", session_id, err),
        }
        result
    }

    async fn execute(
        &self,
        session_id: &str,
        raw_query: &str,
    ) -> Result<TurnOutcome, AgentxCoreError> {
        let history = self.sessions.get_or_create(session_id)?;

        enter(session_id, TurnPhase::Reformulating);
        let standalone_query = self
            .reformulator
            .reformulate(raw_query, &history.turns)
            .await?;

        enter(session_id, TurnPhase::Retrieving);
        let documents = self
            .retriever
            .retrieve(&standalone_query, self.recall_k)
            .await?;

        enter(session_id, TurnPhase::Synthesizing);
        let answer = self
            .synthesizer
            .synthesize(&standalone_query, &history.turns, &documents)
            .await?;

        self.sessions.append(session_id, Role::User, raw_query)?;
        self.sessions.append(session_id, Role::Agent, answer.as_str())?;

        enter(session_id, TurnPhase::CommittingMemory);
        let committed = self.writer.commit(session_id, raw_query, &answer).await?;

        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            standalone_query,
            documents,
            answer,
            committed,
        })
    }

    /// Transcript for `session_id`, creating an empty one on first reference.
    pub fn history(&self, session_id: &str) -> Result<SessionHistory, AgentxCoreError> {
        self.sessions.get_or_create(session_id)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, AgentxCoreError> {
        self.sessions.list_sessions()
    }

    pub fn sessions(&self) -> &SessionHistoryManager {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<VectorMemoryStore> {
        &self.store
    }

    fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }
}

fn enter(session_id: &str, phase: TurnPhase) {
    debug!("turn phase (session_id={}, phase={})", session_id, phase);
}

fn metric_from_config(metric: MemoryMetric) -> SimilarityMetric {
    match metric {
        MemoryMetric::Cosine => SimilarityMetric::Cosine,
        MemoryMetric::Dot => SimilarityMetric::Dot,
        MemoryMetric::Euclidean => SimilarityMetric::Euclidean,
    }
}

/// Translate memory capture settings from config into the store policy.
fn capture_policy_from_config(config: &MemoryCaptureConfig) -> MemoryCapturePolicy {
    MemoryCapturePolicy {
        deny_patterns: config.deny_patterns.clone(),
        redact_patterns: config.redact_patterns.clone(),
        max_record_chars: config.max_record_chars,
        detect_secrets: config.detect_secrets,
        secret_entropy_threshold: config.secret_entropy_threshold,
        redaction_replacement: config.redaction_replacement.clone(),
    }
}

fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn build_default_state_store(
    root: &Path,
    config: &SessionsConfig,
) -> Result<Arc<dyn StateStore>, AgentxCoreError> {
    let path = resolve_path(root, config.path.as_deref().unwrap_or(DEFAULT_SESSIONS_DIR));
    info!("initializing session store (root={})", path.display());
    Ok(Arc::new(JsonlStateStore::new(path)?))
}
