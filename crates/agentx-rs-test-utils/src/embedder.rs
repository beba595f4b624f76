//! Deterministic bag-of-words embedder for retrieval tests.

use agentx_rs_memory::{MemoryError, TextEmbedder};
use async_trait::async_trait;
use autoagents_llm::chat::{ChatMessage, ChatProvider, ChatResponse, StructuredOutputFormat, Tool};
use autoagents_llm::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
use autoagents_llm::embedding::EmbeddingProvider;
use autoagents_llm::error::LLMError;
use autoagents_llm::models::ModelsProvider;
use autoagents_llm::LLMProvider;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_DIMENSION: usize = 256;

/// Hash each lowercase word into a bucket and L2-normalize the counts.
///
/// Texts sharing words get high cosine similarity; identical texts score 1.0.
pub fn hashing_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension.max(1)];
    let words = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase);
    let mut any = false;
    for word in words {
        let bucket = (fnv1a(word.as_bytes()) % vector.len() as u64) as usize;
        vector[bucket] += 1.0;
        any = true;
    }
    if !any {
        // Keep empty text rankable under cosine.
        let last = vector.len() - 1;
        vector[last] = 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    for value in &mut vector {
        *value /= norm;
    }
    vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Embedding provider backed by [`hashing_vector`]. Chat calls fail.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    /// Every batch passed to `embed`, in call order.
    pub batches: Arc<Mutex<Vec<Vec<String>>>>,
    failing: Arc<AtomicBool>,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            batches: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// While set, every embedding call fails. Clones share the switch.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().len()
    }

    fn vectors(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("embeddings offline".to_string());
        }
        let vectors = input
            .iter()
            .map(|text| hashing_vector(text, self.dimension))
            .collect();
        self.batches.lock().push(input);
        Ok(vectors)
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        self.vectors(texts).map_err(MemoryError::Embedding)
    }
}

#[async_trait]
impl ChatProvider for HashingEmbedder {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Err(LLMError::ProviderError("embedding only".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for HashingEmbedder {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        Err(LLMError::ProviderError("embedding only".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        self.vectors(input).map_err(LLMError::ProviderError)
    }
}

#[async_trait]
impl ModelsProvider for HashingEmbedder {}

impl LLMProvider for HashingEmbedder {}
