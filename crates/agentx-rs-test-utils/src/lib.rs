//! Test helpers shared across AgentX crates.

pub mod embedder;
pub mod llm;

pub use embedder::{HashingEmbedder, hashing_vector};
pub use llm::{
    FailingLLM, FixedChatResponse, FixedLLM, RecordingChatLLM, ScriptedLLM, SlowLLM,
};
