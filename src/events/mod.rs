//! Hook-push events: assistants report their own state over a local
//! datagram socket, short-circuiting capture and classification.

mod ingest;
mod store;

pub use ingest::{default_socket_path, EventListener, MAX_DATAGRAM};
pub use store::EventStore;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tmux::parse_target;

/// Closed set of states an assistant hook may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    WaitingInput,
    WaitingApproval,
    Running,
    Completed,
    Error,
    Idle,
}

impl AgentState {
    /// The "needs human" states.
    pub fn needs_attention(self) -> bool {
        matches!(self, AgentState::WaitingInput | AgentState::WaitingApproval)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::WaitingInput => "waiting_input",
            AgentState::WaitingApproval => "waiting_approval",
            AgentState::Running => "running",
            AgentState::Completed => "completed",
            AgentState::Error => "error",
            AgentState::Idle => "idle",
        }
    }
}

/// One push notification. Wire schema (single JSON document per datagram):
/// `{assistant, state, target, ts, message?}` with `ts` in unix seconds UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub assistant: String,
    pub state: AgentState,
    pub target: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Event {
    /// Accepts an event iff the assistant is non-empty after trimming, the
    /// target parses as `session:window.pane`, and the timestamp is set.
    pub fn validate(&self) -> Result<()> {
        if self.assistant.trim().is_empty() {
            bail!("empty assistant");
        }
        if parse_target(&self.target).is_none() {
            bail!("malformed target: {:?}", self.target);
        }
        if self.ts.timestamp() == 0 {
            bail!("zero timestamp");
        }
        Ok(())
    }
}
