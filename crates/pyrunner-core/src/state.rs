//! Session lifecycle state.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, engine not started.
    Idle,
    /// Engine is executing code.
    Running,
    /// Engine is blocked on an input reply.
    AwaitingInput,
    /// Run finished without a fault.
    Completed,
    /// Run ended with a fault.
    Faulted,
}

impl SessionState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted)
    }
}

/// State shared between a session and its input broker.
#[derive(Debug, Clone)]
pub struct StateCell {
    session_id: Arc<str>,
    state: Arc<Mutex<SessionState>>,
}

impl StateCell {
    #[must_use]
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: Arc::from(session_id),
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Move to `next`. Terminal states are sticky.
    pub fn transition(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.is_terminal() {
            tracing::warn!(session_id = %self.session_id, from = ?*state, to = ?next, "ignoring transition out of terminal state");
            return;
        }
        tracing::debug!(session_id = %self.session_id, from = ?*state, to = ?next, "session state");
        *state = next;
    }
}
