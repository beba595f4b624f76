//! Adapters between the engine and `autoagents_llm` providers.

use crate::error::AgentxCoreError;
use crate::types::{ConversationTurn, Role};
use agentx_rs_memory::{MemoryError, TextEmbedder};
use autoagents_llm::LLMProvider;
use autoagents_llm::async_trait;
use autoagents_llm::chat::{ChatMessage, ChatRole, MessageType};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Chat model with a per-call deadline.
#[derive(Clone)]
pub struct LanguageModel {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl LanguageModel {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Send `instructions` as the system message, then `history`, then `prompt`
    /// as the final user message, and return the trimmed reply.
    pub async fn generate(
        &self,
        instructions: &str,
        history: &[ConversationTurn],
        prompt: &str,
    ) -> Result<String, AgentxCoreError> {
        let messages = build_messages(instructions, history, prompt);
        debug!(
            "calling language model (messages={}, prompt_len={})",
            messages.len(),
            prompt.len()
        );
        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat_with_tools(&messages, None, None),
        )
        .await
        .map_err(|_| AgentxCoreError::Timeout {
            operation: "language model",
            timeout_ms: self.timeout.as_millis() as u64,
        })?
        .map_err(|err| AgentxCoreError::LanguageModel(err.to_string()))?;

        let text = response.text().unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentxCoreError::LanguageModel(
                "model returned an empty response".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

fn build_messages(instructions: &str, history: &[ConversationTurn], prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(text_message(ChatRole::System, instructions));
    messages.extend(history.iter().map(|turn| {
        let role = match turn.role {
            Role::User => ChatRole::User,
            Role::Agent => ChatRole::Assistant,
        };
        text_message(role, &turn.content)
    }));
    messages.push(text_message(ChatRole::User, prompt));
    messages
}

fn text_message(role: ChatRole, content: &str) -> ChatMessage {
    ChatMessage {
        role,
        message_type: MessageType::Text,
        content: content.to_string(),
    }
}

/// Exposes an `LLMProvider`'s embedding endpoint as a `TextEmbedder`.
#[derive(Clone)]
pub struct LlmEmbedder {
    provider: Arc<dyn LLMProvider>,
}

impl LlmEmbedder {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TextEmbedder for LlmEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        debug!("calling embedding provider (inputs={})", texts.len());
        self.provider
            .embed(texts)
            .await
            .map_err(|err| MemoryError::Embedding(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{LanguageModel, LlmEmbedder};
    use crate::error::AgentxCoreError;
    use crate::types::{ConversationTurn, Role};
    use agentx_rs_memory::{MemoryError, TextEmbedder};
    use agentx_rs_test_utils::{FailingLLM, FixedLLM, RecordingChatLLM, SlowLLM};
    use autoagents_llm::chat::ChatRole;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn model(provider: Arc<dyn autoagents_llm::LLMProvider>) -> LanguageModel {
        LanguageModel::new(provider, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn generate_sends_system_history_and_prompt() {
        let llm = Arc::new(RecordingChatLLM::new("  Lisbon.  "));
        let history = vec![
            ConversationTurn {
                role: Role::User,
                content: "hi".to_string(),
                sequence: 0,
                created_at: Utc::now(),
            },
            ConversationTurn {
                role: Role::Agent,
                content: "hello".to_string(),
                sequence: 1,
                created_at: Utc::now(),
            },
        ];

        let answer = model(llm.clone())
            .generate("be brief", &history, "capital of Portugal?")
            .await
            .expect("generate");
        assert_eq!(answer, "Lisbon.");

        let messages = llm.last_messages.lock().clone();
        let roles: Vec<ChatRole> = messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(messages[0].content, "be brief");
        assert_eq!(messages[3].content, "capital of Portugal?");
    }

    #[tokio::test]
    async fn empty_response_is_an_error() {
        let err = model(Arc::new(FixedLLM::new("   ")))
            .generate("sys", &[], "q")
            .await
            .expect_err("empty");
        assert!(matches!(err, AgentxCoreError::LanguageModel(_)));
    }

    #[tokio::test]
    async fn provider_failure_maps_to_language_model_error() {
        let err = model(Arc::new(FailingLLM::new("rate limited")))
            .generate("sys", &[], "q")
            .await
            .expect_err("failure");
        match err {
            AgentxCoreError::LanguageModel(message) => assert!(message.contains("rate limited")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let llm = LanguageModel::new(
            Arc::new(SlowLLM::new(Duration::from_secs(5), "late")),
            Duration::from_millis(20),
        );
        let err = llm.generate("sys", &[], "q").await.expect_err("timeout");
        assert!(matches!(
            err,
            AgentxCoreError::Timeout {
                operation: "language model",
                timeout_ms: 20
            }
        ));
    }

    #[tokio::test]
    async fn embedder_adapts_provider_errors() {
        let embedder = LlmEmbedder::new(Arc::new(FixedLLM::new("x").with_embedding(vec![0.5, 0.5])));
        let vector = embedder.embed_one("hello").await.expect("embed");
        assert_eq!(vector, vec![0.5, 0.5]);

        let failing = LlmEmbedder::new(Arc::new(FailingLLM::new("down")));
        let err = failing.embed_one("hello").await.expect_err("failure");
        assert!(matches!(err, MemoryError::Embedding(_)));
    }
}
