//! Configuration schema for AgentX.

use serde::{Deserialize, Serialize};

/// Root config for the AgentX engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentxConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl AgentxConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> AgentxConfigBuilder {
        AgentxConfigBuilder::new()
    }
}

/// Builder for assembling an `AgentxConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct AgentxConfigBuilder {
    config: AgentxConfig,
}

impl AgentxConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AgentxConfig::default(),
        }
    }

    pub fn model(mut self, model: ModelConfig) -> Self {
        self.config.model = model;
        self
    }

    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    pub fn prompts(mut self, prompts: PromptsConfig) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutsConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Finalize and return the built `AgentxConfig`.
    pub fn build(self) -> AgentxConfig {
        self.config
    }
}

/// Language model and embedding model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

/// Similarity metric used to rank memory records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMetric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

/// Persistent vector memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding the snapshot, relative to the working directory.
    #[serde(default = "default_memory_path")]
    pub path: String,
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
    /// Text of the record seeded into a brand new store.
    #[serde(default = "default_seed_text")]
    pub seed_text: String,
    /// Expected embedding width; checked against an existing snapshot.
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub metric: MemoryMetric,
    #[serde(default)]
    pub capture: MemoryCaptureConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            recall_k: default_recall_k(),
            seed_text: default_seed_text(),
            dimension: None,
            metric: MemoryMetric::default(),
            capture: MemoryCaptureConfig::default(),
        }
    }
}

fn default_memory_path() -> String {
    ".agentx/memory".to_string()
}

fn default_recall_k() -> usize {
    4
}

fn default_seed_text() -> String {
    "Initial AgentX memory.".to_string()
}

/// Filters applied to question/answer records before they are written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCaptureConfig {
    #[serde(default)]
    pub deny_patterns: Vec<String>,
    #[serde(default)]
    pub redact_patterns: Vec<String>,
    #[serde(default)]
    pub max_record_chars: Option<usize>,
    #[serde(default = "default_detect_secrets")]
    pub detect_secrets: bool,
    #[serde(default = "default_secret_entropy_threshold")]
    pub secret_entropy_threshold: f32,
    #[serde(default = "default_redaction_replacement")]
    pub redaction_replacement: String,
}

impl Default for MemoryCaptureConfig {
    fn default() -> Self {
        Self {
            deny_patterns: Vec::new(),
            redact_patterns: Vec::new(),
            max_record_chars: None,
            detect_secrets: default_detect_secrets(),
            secret_entropy_threshold: default_secret_entropy_threshold(),
            redaction_replacement: default_redaction_replacement(),
        }
    }
}

fn default_detect_secrets() -> bool {
    true
}

/// Default entropy threshold for identifying secrets.
fn default_secret_entropy_threshold() -> f32 {
    3.7
}

fn default_redaction_replacement() -> String {
    "[REDACTED]".to_string()
}

/// Session transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Persist transcripts as JSONL so sessions survive restarts.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<String>,
    /// Most recent turns sent to the model; 0 sends the whole history.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            history_window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    20
}

/// Placeholder replaced by retrieved memory in the answer prompt.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// System instructions sent to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_reformulate_prompt")]
    pub reformulate: String,
    #[serde(default = "default_answer_prompt")]
    pub answer: String,
    /// Notice used in place of context when retrieval finds nothing usable.
    #[serde(default = "default_no_context_prompt")]
    pub no_context: String,
    /// Documents scoring below this are treated as irrelevant.
    #[serde(default)]
    pub min_context_score: Option<f32>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            reformulate: default_reformulate_prompt(),
            answer: default_answer_prompt(),
            no_context: default_no_context_prompt(),
            min_context_score: None,
        }
    }
}

fn default_reformulate_prompt() -> String {
    "Given the conversation history and the latest user question, which may refer to \
     earlier turns, rewrite the question so it can be understood without the history. \
     Do not answer it. Return only the rewritten question."
        .to_string()
}

fn default_answer_prompt() -> String {
    "You are AgentX, an assistant with long-term memory. Use the retrieved memory below \
     to answer the user's question. If you don't know the answer, say that you don't \
     know.\n\nRetrieved memory:\n{context}"
        .to_string()
}

fn default_no_context_prompt() -> String {
    "No relevant memory was found for this question. If the conversation alone does not \
     answer it, say that you don't know."
        .to_string()
}

/// Deadlines for external calls, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_ms: u64,
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_ms: u64,
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            embedding_ms: default_embedding_timeout_ms(),
            llm_ms: default_llm_timeout_ms(),
            persist_ms: default_persist_timeout_ms(),
        }
    }
}

fn default_embedding_timeout_ms() -> u64 {
    30_000
}

fn default_llm_timeout_ms() -> u64 {
    60_000
}

fn default_persist_timeout_ms() -> u64 {
    10_000
}
