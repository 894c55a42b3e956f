//! Execution session: one run of one code submission.

use std::{any::Any, sync::Arc};

use tokio::{runtime::Handle, task::JoinError};

use crate::{
    capture::CapturedStreams,
    engine::{Bindings, Engine, Execution},
    fault::{self, Fault},
    protocol::{ProtocolError, ProtocolMessage, ProtocolPeer},
    state::{SessionState, StateCell},
};

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Session already ran")]
    AlreadyRan,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// `Completed` or `Faulted`.
    pub state: SessionState,
    /// Messages written after the engine returned.
    pub messages_flushed: usize,
}

/// A single execution bound to a parent connection.
pub struct Session {
    id: String,
    peer: ProtocolPeer,
    state: StateCell,
}

impl Session {
    /// Create an idle session. The id is opaque and not validated.
    #[must_use]
    pub fn new(id: impl Into<String>, peer: ProtocolPeer) -> Self {
        let id = id.into();
        let state = StateCell::new(&id);
        Self { id, peer, state }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Primitives for this session, driven by `runtime`.
    #[must_use]
    pub fn bindings(&self, runtime: Handle) -> Bindings {
        Bindings::new(self.peer.clone(), runtime, self.id.clone(), self.state.clone())
    }

    /// Run `code` on `engine` and report everything it produced.
    ///
    /// The engine runs on a blocking thread; its primitives write through
    /// this session's peer as they are called. Once it returns the bindings
    /// are revoked, so primitives the engine still holds can no longer write.
    /// Captured stdout is flushed, then captured stderr, then the fault if any.
    ///
    /// # Errors
    /// Returns error if the session already ran or a message cannot be
    /// written.
    pub async fn run(&self, engine: Arc<dyn Engine>, code: String) -> Result<RunReport, SessionError> {
        if self.state.get() != SessionState::Idle {
            return Err(SessionError::AlreadyRan);
        }
        self.state.transition(SessionState::Running);
        tracing::debug!(session_id = %self.id, engine = engine.name(), bytes = code.len(), "starting run");

        let bindings = self.bindings(Handle::current());
        let lent = bindings.clone();
        let execution = tokio::task::spawn_blocking(move || engine.execute(&code, &lent))
            .await
            .unwrap_or_else(|e| Execution::faulted(CapturedStreams::default(), join_fault(e)));
        bindings.revoke();

        let mut messages_flushed = 0;
        for message in execution.captured.into_messages() {
            self.peer.send(&message).await?;
            messages_flushed += 1;
        }

        let state = match execution.outcome {
            Ok(()) => SessionState::Completed,
            Err(fault) => {
                tracing::debug!(session_id = %self.id, kind = %fault.kind, "run faulted");
                self.peer
                    .send(&ProtocolMessage::error(fault::translate(&fault)))
                    .await?;
                messages_flushed += 1;
                SessionState::Faulted
            }
        };
        self.state.transition(state);
        tracing::info!(session_id = %self.id, ?state, "run finished");

        Ok(RunReport {
            state,
            messages_flushed,
        })
    }
}

fn join_fault(error: JoinError) -> Fault {
    if error.is_cancelled() {
        return Fault::engine_panic("engine task was cancelled");
    }
    Fault::engine_panic(panic_message(&*error.into_panic()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "engine panicked".to_string())
}
