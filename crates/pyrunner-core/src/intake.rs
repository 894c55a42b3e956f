//! Sentinel-framed code intake.

use crate::{
    config::RunnerConfig,
    protocol::{ProtocolError, ProtocolPeer},
};

/// Read code lines until the sentinel line or end of stream.
///
/// Lines keep their terminators. Returns `None` if nothing preceded the
/// sentinel.
///
/// # Errors
/// Returns error if reading fails.
pub async fn read_code(
    peer: &ProtocolPeer,
    config: &RunnerConfig,
) -> Result<Option<String>, ProtocolError> {
    let mut code = String::new();
    let mut lines = 0usize;

    while let Some(line) = peer.read_line().await? {
        if config.is_sentinel(&line) {
            tracing::debug!(lines, "code intake reached sentinel");
            return Ok(non_empty(code));
        }
        code.push_str(&line);
        lines += 1;
    }

    tracing::debug!(lines, "code intake reached end of stream");
    Ok(non_empty(code))
}

fn non_empty(code: String) -> Option<String> {
    (!code.is_empty()).then_some(code)
}
