//! Interactive execution protocol and I/O arbitration.
//!
//! Provides:
//! - `ProtocolPeer` / `ProtocolMessage` - line-delimited JSON wire protocol
//! - `OutputChannel` / `CapturedStreams` - immediate and buffered output
//! - `InputBroker` - blocking input request/reply handshake
//! - `Session` - one run of one submission against an `Engine`
//! - `Fault` - structured run-ending failures

pub mod broker;
pub mod capture;
pub mod config;
pub mod engine;
pub mod fault;
pub mod intake;
pub mod protocol;
pub mod runner;
pub mod session;
pub mod state;

pub use broker::InputBroker;
pub use capture::{CapturedStreams, OutputChannel, PrintOptions};
pub use config::RunnerConfig;
pub use engine::{Bindings, Engine, Execution};
pub use fault::{Chain, Fault, Frame};
pub use protocol::{InputResponse, PeerLease, ProtocolError, ProtocolMessage, ProtocolPeer};
pub use runner::{RunStatus, run};
pub use session::{RunReport, Session, SessionError};
pub use state::SessionState;
