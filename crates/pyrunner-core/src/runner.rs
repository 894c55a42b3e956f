//! End-to-end sequencing of one invocation.

use std::sync::Arc;

use crate::{
    config::RunnerConfig,
    engine::Engine,
    intake,
    protocol::{ProtocolMessage, ProtocolPeer},
    session::{RunReport, Session, SessionError},
};

/// Content of the error sent when intake yields no code.
pub const NO_CODE_MESSAGE: &str = "No code provided";

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Code ran; faults are reported in-band, not here.
    Executed(RunReport),
    /// Nothing preceded the sentinel.
    NoCode,
}

impl RunStatus {
    /// Whether the process should exit successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Executed(_))
    }
}

/// Read code from `peer`, then run it in a fresh session.
///
/// # Errors
/// Returns error if the parent connection fails.
pub async fn run(
    config: &RunnerConfig,
    session_id: impl Into<String>,
    peer: ProtocolPeer,
    engine: Arc<dyn Engine>,
) -> Result<RunStatus, SessionError> {
    let Some(code) = intake::read_code(&peer, config).await? else {
        tracing::warn!("no code received before sentinel");
        peer.send(&ProtocolMessage::error(NO_CODE_MESSAGE)).await?;
        return Ok(RunStatus::NoCode);
    };

    let session = Session::new(session_id, peer);
    let report = session.run(engine, code).await?;
    Ok(RunStatus::Executed(report))
}
