//! Session transcript persistence using JSONL rollouts.

use crate::types::{ConversationTurn, Role, SessionHistory, SessionSummary};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const ROLLOUT_SCHEMA_VERSION: u32 = 1;

/// Durable backing for session transcripts.
pub trait StateStore: Send + Sync {
    /// Record that a session was created.
    fn record_session(&self, session_id: &str, created_at: DateTime<Utc>)
    -> Result<(), StateError>;
    /// Append a turn to an existing session.
    fn append_turn(&self, session_id: &str, turn: &ConversationTurn) -> Result<(), StateError>;
    /// Rebuild a session transcript, if one was recorded.
    fn load_session(&self, session_id: &str) -> Result<Option<SessionHistory>, StateError>;
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StateError>;
}

/// Errors returned by the state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    #[error("missing session metadata")]
    MissingMetadata,
    #[error("session already exists: {0}")]
    SessionExists(String),
    #[error("turn out of order (expected={expected}, actual={actual})")]
    OutOfOrder { expected: u64, actual: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutEvent {
    SchemaVersion {
        version: u32,
    },
    SessionCreated {
        session_id: String,
        created_at: DateTime<Utc>,
    },
    Turn {
        session_id: String,
        role: Role,
        content: String,
        sequence: u64,
        created_at: DateTime<Utc>,
    },
}

#[derive(Default)]
struct RolloutState {
    version: Option<u32>,
    session_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    turns: Vec<ConversationTurn>,
}

impl RolloutState {
    fn apply(&mut self, event: RolloutEvent) -> Result<(), StateError> {
        match event {
            RolloutEvent::SchemaVersion { version } => {
                if version > ROLLOUT_SCHEMA_VERSION {
                    return Err(StateError::UnsupportedSchema(version));
                }
                self.version = Some(version);
            }
            RolloutEvent::SessionCreated {
                session_id,
                created_at,
            } => {
                self.session_id = Some(session_id);
                self.created_at = Some(created_at);
            }
            RolloutEvent::Turn {
                role,
                content,
                sequence,
                created_at,
                ..
            } => {
                let expected = self.turns.len() as u64;
                if sequence != expected {
                    return Err(StateError::OutOfOrder {
                        expected,
                        actual: sequence,
                    });
                }
                self.turns.push(ConversationTurn {
                    role,
                    content,
                    sequence,
                    created_at,
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<SessionHistory, StateError> {
        self.version.ok_or(StateError::MissingMetadata)?;
        Ok(SessionHistory {
            id: self.session_id.ok_or(StateError::MissingMetadata)?,
            created_at: self.created_at.ok_or(StateError::MissingMetadata)?,
            turns: self.turns,
        })
    }
}

/// One `<encoded session id>.jsonl` file per session under `root`.
pub struct JsonlStateStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStateStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StateError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL state store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn rollout_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.jsonl", encode_file_stem(session_id)))
    }

    fn write_event(&self, session_id: &str, event: &RolloutEvent) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.rollout_path(session_id))?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn write_new_rollout(&self, session_id: &str, event: &RolloutEvent) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();
        let path = self.rollout_path(session_id);
        if path.exists() {
            return Err(StateError::SessionExists(session_id.to_string()));
        }
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        let header = serde_json::to_string(&RolloutEvent::SchemaVersion {
            version: ROLLOUT_SCHEMA_VERSION,
        })?;
        writeln!(file, "{header}")?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn read_rollout(&self, path: &Path) -> Result<SessionHistory, StateError> {
        let reader = BufReader::new(OpenOptions::new().read(true).open(path)?);
        let mut rollout = RolloutState::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            rollout.apply(serde_json::from_str(&line)?)?;
        }
        rollout.finish()
    }
}

impl StateStore for JsonlStateStore {
    fn record_session(
        &self,
        session_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), StateError> {
        info!("recording session creation (session_id={})", session_id);
        let event = RolloutEvent::SessionCreated {
            session_id: session_id.to_string(),
            created_at,
        };
        self.write_new_rollout(session_id, &event)
    }

    fn append_turn(&self, session_id: &str, turn: &ConversationTurn) -> Result<(), StateError> {
        debug!(
            "appending turn event (session_id={}, role={}, sequence={}, content_len={})",
            session_id,
            turn.role.as_str(),
            turn.sequence,
            turn.content.len()
        );
        let event = RolloutEvent::Turn {
            session_id: session_id.to_string(),
            role: turn.role,
            content: turn.content.clone(),
            sequence: turn.sequence,
            created_at: turn.created_at,
        };
        self.write_event(session_id, &event)
    }

    fn load_session(&self, session_id: &str) -> Result<Option<SessionHistory>, StateError> {
        let path = self.rollout_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_rollout(&path).map(Some)
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StateError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            match self.read_rollout(&path) {
                Ok(history) => summaries.push(SessionSummary {
                    id: history.id,
                    turn_count: history.turns.len(),
                    created_at: history.created_at,
                }),
                Err(err) => warn!(
                    "skipping unreadable rollout (path={}, error={})",
                    path.display(),
                    err
                ),
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}

/// Map an arbitrary session id onto a safe, reversible file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes `~xx`.
fn encode_file_stem(session_id: &str) -> String {
    let mut out = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("~{byte:02x}"));
        }
    }
    if out.is_empty() {
        out.push('~');
    }
    out
}
