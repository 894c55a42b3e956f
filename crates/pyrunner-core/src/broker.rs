//! Input broker: the blocking request/reply handshake.

use tokio::runtime::Handle;

use crate::{
    protocol::{PeerLease, ProtocolError, ProtocolMessage},
    state::{SessionState, StateCell},
};

/// Input primitive bound to one session.
///
/// Execution is single-threaded, so at most one request is ever
/// outstanding. Must be called from a blocking thread, never from inside
/// the async runtime.
#[derive(Clone)]
pub struct InputBroker {
    lease: PeerLease,
    runtime: Handle,
    session_id: String,
    state: StateCell,
}

impl InputBroker {
    #[must_use]
    pub const fn new(lease: PeerLease, runtime: Handle, session_id: String, state: StateCell) -> Self {
        Self {
            lease,
            runtime,
            session_id,
            state,
        }
    }

    /// Send an `input_request` and block until one reply line arrives.
    ///
    /// There is no timeout. End of stream yields an empty string.
    ///
    /// # Errors
    /// Returns error if the request cannot be written, the read fails or the
    /// session has ended.
    pub fn request_input(&self, prompt: &str) -> Result<String, ProtocolError> {
        let peer = self.lease.peer()?;
        self.state.transition(SessionState::AwaitingInput);
        let result = self.runtime.block_on(async {
            peer.send(&ProtocolMessage::input_request(prompt, &*self.session_id))
                .await?;
            peer.read_response().await
        });
        self.state.transition(SessionState::Running);
        Ok(result?.into_inner())
    }
}
