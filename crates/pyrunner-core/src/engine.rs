//! Evaluation engine seam.

use tokio::runtime::Handle;

use crate::{
    broker::InputBroker,
    capture::{CapturedStreams, OutputChannel},
    fault::Fault,
    protocol::{PeerLease, ProtocolPeer},
    state::StateCell,
};

/// Capabilities injected into a run's namespace.
///
/// Engines must route their print and input primitives exclusively through
/// these, in place of whatever defaults they would otherwise provide.
/// Both share one lease on the peer; after `revoke` they fail with
/// `ProtocolError::Closed` instead of writing.
#[derive(Clone)]
pub struct Bindings {
    pub output: OutputChannel,
    pub input: InputBroker,
    lease: PeerLease,
}

impl Bindings {
    #[must_use]
    pub fn new(
        peer: ProtocolPeer,
        runtime: Handle,
        session_id: impl Into<String>,
        state: StateCell,
    ) -> Self {
        let lease = PeerLease::new(peer);
        Self {
            output: OutputChannel::new(lease.clone(), runtime.clone()),
            input: InputBroker::new(lease.clone(), runtime, session_id.into(), state),
            lease,
        }
    }

    /// Release the peer for every copy of these bindings.
    pub fn revoke(&self) {
        self.lease.revoke();
    }
}

/// What an engine hands back once code stops running.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Raw stream writes captured during the run, including before a fault.
    pub captured: CapturedStreams,
    /// `Err` when the run ended with a fault.
    pub outcome: Result<(), Fault>,
}

impl Execution {
    #[must_use]
    pub fn completed(captured: CapturedStreams) -> Self {
        Self {
            captured,
            outcome: Ok(()),
        }
    }

    #[must_use]
    pub fn faulted(captured: CapturedStreams, fault: Fault) -> Self {
        Self {
            captured,
            outcome: Err(fault),
        }
    }
}

/// Trait for evaluation engines.
///
/// `execute` runs on a blocking thread and may block for as long as the
/// code does, including while waiting on input replies.
pub trait Engine: Send + Sync {
    /// Engine name, for diagnostics.
    fn name(&self) -> &str;

    /// Run `code` with `bindings` installed. Faults are returned, not raised.
    fn execute(&self, code: &str, bindings: &Bindings) -> Execution;
}
