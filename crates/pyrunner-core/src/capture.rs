//! Capture surface: primitive-channel output and whole-run raw stream buffers.

use tokio::runtime::Handle;

use crate::protocol::{PeerLease, ProtocolError, ProtocolMessage};

/// Keyword options of the injected print primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub separator: String,
    pub terminator: String,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            terminator: "\n".to_string(),
        }
    }
}

impl PrintOptions {
    /// Join already-stringified arguments the way print would write them,
    /// then drop trailing newlines.
    #[must_use]
    pub fn render<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut text = args
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&self.separator);
        text.push_str(&self.terminator);
        text.trim_end_matches('\n').to_string()
    }
}

/// Output primitive bound to one session.
///
/// Each call produces exactly one `output` message, written and flushed
/// before the call returns. Must be called from a blocking thread, never
/// from inside the async runtime.
#[derive(Clone)]
pub struct OutputChannel {
    lease: PeerLease,
    runtime: Handle,
}

impl OutputChannel {
    /// Bind to a leased peer and the runtime that drives it.
    #[must_use]
    pub const fn new(lease: PeerLease, runtime: Handle) -> Self {
        Self { lease, runtime }
    }

    /// Emit print-style output.
    ///
    /// # Errors
    /// Returns error if the message cannot be written or the session has
    /// ended.
    pub fn print<S: AsRef<str>>(&self, args: &[S], options: &PrintOptions) -> Result<(), ProtocolError> {
        let peer = self.lease.peer()?;
        let message = ProtocolMessage::output(options.render(args));
        self.runtime.block_on(peer.send(&message))
    }
}

/// Raw stdout/stderr text written by a run outside the print primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStreams {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedStreams {
    /// Create from the two buffers.
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Messages to flush at run end: stdout before stderr, empty buffers skipped.
    #[must_use]
    pub fn into_messages(self) -> Vec<ProtocolMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.stdout.is_empty() {
            messages.push(ProtocolMessage::output(self.stdout.trim_end_matches('\n')));
        }
        if !self.stderr.is_empty() {
            messages.push(ProtocolMessage::error(self.stderr.trim_end_matches('\n')));
        }
        messages
    }
}
