//! Per-session transcripts with optional persistence via `StateStore`.

use crate::error::AgentxCoreError;
use crate::state::StateStore;
use crate::types::{ConversationTurn, Role, SessionHistory, SessionSummary};
use chrono::Utc;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of session transcripts, injected into the engine.
#[derive(Clone, Default)]
pub struct SessionHistoryManager {
    sessions: Arc<RwLock<HashMap<String, SessionHistory>>>,
    state_store: Option<Arc<dyn StateStore>>,
}

impl SessionHistoryManager {
    pub fn new(state_store: Option<Arc<dyn StateStore>>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            state_store,
        }
    }

    /// Return the session transcript, creating it on first reference.
    ///
    /// With a state store attached, a session recorded by an earlier process
    /// is rehydrated instead of starting empty.
    pub fn get_or_create(&self, session_id: &str) -> Result<SessionHistory, AgentxCoreError> {
        if let Some(history) = self.sessions.read().get(session_id) {
            return Ok(history.clone());
        }
        let mut sessions = self.sessions.write();
        Ok(self.ensure_loaded(&mut sessions, session_id)?.clone())
    }

    /// Append a turn to the end of the session, assigning its sequence index.
    pub fn append(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<ConversationTurn, AgentxCoreError> {
        let mut sessions = self.sessions.write();
        let history = self.ensure_loaded(&mut sessions, session_id)?;
        let turn = ConversationTurn {
            role,
            content: content.into(),
            sequence: history.turns.len() as u64,
            created_at: Utc::now(),
        };
        if let Some(store) = &self.state_store {
            store.append_turn(session_id, &turn)?;
        }
        debug!(
            "appended turn (session_id={}, role={}, sequence={}, content_len={})",
            session_id,
            turn.role.as_str(),
            turn.sequence,
            turn.content.len()
        );
        history.turns.push(turn.clone());
        Ok(turn)
    }

    /// Transcript for a session already referenced in this process.
    pub fn history(&self, session_id: &str) -> Option<SessionHistory> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Sessions from the state store when attached, otherwise those in memory.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, AgentxCoreError> {
        if let Some(store) = &self.state_store {
            return Ok(store.list_sessions()?);
        }
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .values()
            .map(|history| SessionSummary {
                id: history.id.clone(),
                turn_count: history.turns.len(),
                created_at: history.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn ensure_loaded<'a>(
        &self,
        sessions: &'a mut HashMap<String, SessionHistory>,
        session_id: &str,
    ) -> Result<&'a mut SessionHistory, AgentxCoreError> {
        if !sessions.contains_key(session_id) {
            let history = self.load_or_start(session_id)?;
            sessions.insert(session_id.to_string(), history);
        }
        sessions
            .get_mut(session_id)
            .ok_or_else(|| AgentxCoreError::State(format!("session vanished: {session_id}")))
    }

    fn load_or_start(&self, session_id: &str) -> Result<SessionHistory, AgentxCoreError> {
        if let Some(store) = &self.state_store
            && let Some(history) = store.load_session(session_id)?
        {
            info!(
                "rehydrated session (session_id={}, turns={})",
                session_id,
                history.turns.len()
            );
            return Ok(history);
        }

        let history = SessionHistory::new(session_id);
        if let Some(store) = &self.state_store {
            store.record_session(session_id, history.created_at)?;
        }
        info!("created session (session_id={})", session_id);
        Ok(history)
    }
}
