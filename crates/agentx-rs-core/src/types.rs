//! Core data types shared across the engine API.

use agentx_rs_memory::{MemoryRecord, ScoredRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Opaque session key supplied by the caller.
pub type SessionId = String;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One entry of a session transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Position in the session, starting at zero.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

/// Ordered transcript for a single session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionHistory {
    pub id: SessionId,
    pub turns: Vec<ConversationTurn>,
    pub created_at: DateTime<Utc>,
}

impl SessionHistory {
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `window` turns, or all of them when `window` is zero.
    pub fn recent(&self, window: usize) -> &[ConversationTurn] {
        recent_turns(&self.turns, window)
    }
}

/// Tail of `turns` limited to `window` entries; zero keeps everything.
pub fn recent_turns(turns: &[ConversationTurn], window: usize) -> &[ConversationTurn] {
    if window == 0 || window >= turns.len() {
        turns
    } else {
        &turns[turns.len() - window..]
    }
}

/// Summary view of a session for listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Step of the per-turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Reformulating,
    Retrieving,
    Synthesizing,
    CommittingMemory,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Reformulating => "reformulating",
            TurnPhase::Retrieving => "retrieving",
            TurnPhase::Synthesizing => "synthesizing",
            TurnPhase::CommittingMemory => "committing_memory",
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    /// Query after reformulation; equal to the raw query on a fresh session.
    pub standalone_query: String,
    /// Retrieved records, best first.
    pub documents: Vec<ScoredRecord>,
    pub answer: String,
    /// Record written back to memory, or `None` when the capture policy skipped it.
    pub committed: Option<MemoryRecord>,
}

#[cfg(test)]
mod tests {
    use super::{ConversationTurn, Role, SessionHistory};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn turn(sequence: u64) -> ConversationTurn {
        ConversationTurn {
            role: if sequence % 2 == 0 { Role::User } else { Role::Agent },
            content: format!("turn {sequence}"),
            sequence,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn role_parses_and_formats() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("agent".parse::<Role>(), Ok(Role::Agent));
        assert!("system".parse::<Role>().is_err());
        assert_eq!(Role::Agent.as_str(), "agent");
    }

    #[test]
    fn recent_returns_tail_of_history() {
        let mut history = SessionHistory::new("s");
        history.turns = (0..5).map(turn).collect();

        let tail: Vec<u64> = history.recent(2).iter().map(|t| t.sequence).collect();
        assert_eq!(tail, vec![3, 4]);
        assert_eq!(history.recent(0).len(), 5);
        assert_eq!(history.recent(50).len(), 5);
    }
}
