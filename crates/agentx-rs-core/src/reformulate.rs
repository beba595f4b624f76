//! Rewrites follow-up questions into standalone queries.

use crate::error::AgentxCoreError;
use crate::llm::LanguageModel;
use crate::types::{ConversationTurn, recent_turns};
use log::debug;

pub struct QueryReformulator {
    model: LanguageModel,
    instructions: String,
    history_window: usize,
}

impl QueryReformulator {
    pub fn new(model: LanguageModel, instructions: impl Into<String>, history_window: usize) -> Self {
        Self {
            model,
            instructions: instructions.into(),
            history_window,
        }
    }

    /// Resolve references in `raw_query` against `history`.
    ///
    /// An empty history returns `raw_query` unchanged without calling the model.
    pub async fn reformulate(
        &self,
        raw_query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, AgentxCoreError> {
        if history.is_empty() {
            return Ok(raw_query.to_string());
        }
        let window = recent_turns(history, self.history_window);
        let standalone = self
            .model
            .generate(&self.instructions, window, raw_query)
            .await?;
        debug!(
            "reformulated query (raw_len={}, standalone_len={})",
            raw_query.len(),
            standalone.len()
        );
        Ok(standalone)
    }
}

#[cfg(test)]
mod tests {
    use super::QueryReformulator;
    use crate::llm::LanguageModel;
    use crate::types::{ConversationTurn, Role};
    use agentx_rs_test_utils::ScriptedLLM;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn reformulator(llm: &ScriptedLLM, window: usize) -> QueryReformulator {
        QueryReformulator::new(
            LanguageModel::new(Arc::new(llm.clone()), Duration::from_secs(5)),
            "rewrite",
            window,
        )
    }

    fn turns(count: u64) -> Vec<ConversationTurn> {
        (0..count)
            .map(|sequence| ConversationTurn {
                role: if sequence % 2 == 0 { Role::User } else { Role::Agent },
                content: format!("turn {sequence}"),
                sequence,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_history_is_identity_without_model_call() {
        let llm = ScriptedLLM::new(Vec::<String>::new());
        let query = "  What is the capital of Portugal?  ";
        let standalone = reformulator(&llm, 20)
            .reformulate(query, &[])
            .await
            .expect("reformulate");
        assert_eq!(standalone, query);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn uses_model_output_and_history_window() {
        let llm = ScriptedLLM::new(["What was the capital of Portugal I asked about?"]);
        let standalone = reformulator(&llm, 2)
            .reformulate("what did I ask?", &turns(6))
            .await
            .expect("reformulate");
        assert_eq!(standalone, "What was the capital of Portugal I asked about?");

        let calls = llm.calls.lock().clone();
        assert_eq!(calls.len(), 1);
        // system + two windowed turns + the raw query
        assert_eq!(calls[0].len(), 4);
        assert_eq!(calls[0][1].content, "turn 4");
        assert_eq!(calls[0][3].content, "what did I ask?");
    }
}
