//! Answers a standalone query from retrieved memory and conversation history.

use crate::error::AgentxCoreError;
use crate::llm::LanguageModel;
use crate::types::{ConversationTurn, recent_turns};
use agentx_rs_config::CONTEXT_PLACEHOLDER;
use agentx_rs_memory::ScoredRecord;
use log::debug;

/// Prompt templates used by [`AnswerSynthesizer`].
#[derive(Debug, Clone)]
pub struct SynthesisPrompts {
    /// System instruction; `{context}` is replaced by retrieved memory.
    pub answer: String,
    /// Substituted for `{context}` when no document is usable.
    pub no_context: String,
    /// Documents scoring below this are ignored.
    pub min_context_score: Option<f32>,
}

pub struct AnswerSynthesizer {
    model: LanguageModel,
    prompts: SynthesisPrompts,
    history_window: usize,
}

impl AnswerSynthesizer {
    pub fn new(model: LanguageModel, prompts: SynthesisPrompts, history_window: usize) -> Self {
        Self {
            model,
            prompts,
            history_window,
        }
    }

    pub async fn synthesize(
        &self,
        standalone_query: &str,
        history: &[ConversationTurn],
        documents: &[ScoredRecord],
    ) -> Result<String, AgentxCoreError> {
        let instructions = self.system_prompt(documents);
        let window = recent_turns(history, self.history_window);
        self.model
            .generate(&instructions, window, standalone_query)
            .await
    }

    /// Fill the answer template with usable documents, or with the
    /// uncertainty notice when none qualify.
    pub fn system_prompt(&self, documents: &[ScoredRecord]) -> String {
        let usable: Vec<&str> = documents
            .iter()
            .filter(|doc| {
                self.prompts
                    .min_context_score
                    .is_none_or(|min| doc.score >= min)
            })
            .map(|doc| doc.record.text.as_str())
            .collect();
        debug!(
            "building answer prompt (documents={}, usable={})",
            documents.len(),
            usable.len()
        );
        let context = if usable.is_empty() {
            self.prompts.no_context.clone()
        } else {
            usable.join("\n\n")
        };
        self.prompts.answer.replace(CONTEXT_PLACEHOLDER, &context)
    }
}
