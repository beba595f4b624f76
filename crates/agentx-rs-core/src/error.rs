//! Error types for the conversation engine.

use agentx_rs_config::ConfigError;
use agentx_rs_memory::MemoryError;
use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum AgentxCoreError {
    /// The durable memory snapshot could not be loaded at startup.
    #[error("failed to load memory store: {0}")]
    StoreLoad(#[source] MemoryError),
    /// Memory store error during a turn.
    #[error("memory error: {0}")]
    Memory(#[source] MemoryError),
    /// Embedding provider failed.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Language model provider failed or returned nothing usable.
    #[error("language model error: {0}")]
    LanguageModel(String),
    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    /// Engine configuration rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Session state store error.
    #[error("state error: {0}")]
    State(String),
    /// Turn execution error.
    #[error("executor error: {0}")]
    Executor(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentxCoreError {
    /// Whether the interactive loop can keep serving after this error.
    ///
    /// Only startup load failures are fatal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AgentxCoreError::StoreLoad(_))
    }
}

impl From<MemoryError> for AgentxCoreError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Embedding(message) => AgentxCoreError::Embedding(message),
            other => AgentxCoreError::Memory(other),
        }
    }
}

impl From<crate::state::StateError> for AgentxCoreError {
    fn from(err: crate::state::StateError) -> Self {
        AgentxCoreError::State(err.to_string())
    }
}
