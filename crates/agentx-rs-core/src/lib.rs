//! Conversation engine for AgentX.
//!
//! This crate owns session transcripts, query reformulation, retrieval from
//! the shared vector memory, answer synthesis, and write-back of each
//! completed turn.

pub mod engine;
pub mod error;
pub mod llm;
pub mod reformulate;
pub mod retriever;
pub mod sessions;
pub mod state;
pub mod synthesizer;
pub mod types;
pub mod writer;

/// Engine facade and its builder.
pub use engine::{ConversationEngine, ConversationEngineBuilder};
pub use error::AgentxCoreError;
/// Provider adapters.
pub use llm::{LanguageModel, LlmEmbedder};
pub use reformulate::QueryReformulator;
pub use retriever::Retriever;
pub use sessions::SessionHistoryManager;
/// Transcript persistence.
pub use state::{JsonlStateStore, StateError, StateStore};
pub use synthesizer::{AnswerSynthesizer, SynthesisPrompts};
pub use types::{
    ConversationTurn, Role, SessionHistory, SessionId, SessionSummary, TurnOutcome, TurnPhase,
};
pub use writer::{MemoryWriter, format_record};
