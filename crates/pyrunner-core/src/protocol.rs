//! Line-delimited wire protocol between the runner and its parent.

use std::sync::{Arc, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::Mutex,
};

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session is closed")]
    Closed,
}

/// Message from the runner to the parent.
///
/// Encoded as one JSON object per line. JSON escapes embedded newlines, so
/// multi-line content never breaks the framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// Program output.
    Output { content: String },
    /// Program error output or a translated fault.
    Error { content: String },
    /// The running code is blocked waiting for a reply line.
    InputRequest {
        prompt: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl ProtocolMessage {
    /// Create an output message.
    #[must_use]
    pub fn output(content: impl Into<String>) -> Self {
        Self::Output {
            content: content.into(),
        }
    }

    /// Create an error message.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// Create an input request for a session.
    #[must_use]
    pub fn input_request(prompt: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::InputRequest {
            prompt: prompt.into(),
            session_id: session_id.into(),
        }
    }

    /// Encode as a single line, without the trailing newline.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reply from the parent to an outstanding input request.
///
/// Replies are bare text lines with no envelope and no correlation id; they
/// pair with the single outstanding request by order alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputResponse(pub String);

impl InputResponse {
    /// Decode a raw line, dropping its trailing line terminator.
    #[must_use]
    pub fn decode(line: &str) -> Self {
        Self(strip_line_terminator(line).to_string())
    }

    /// Reply text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Remove one trailing `\n` or `\r\n`.
#[must_use]
pub fn strip_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Both ends of the parent connection.
///
/// The writer is the only path by which bytes reach the parent; the reader
/// is shared by code intake and input replies so buffered bytes are never
/// lost between the two.
#[derive(Clone)]
pub struct ProtocolPeer {
    reader: Arc<Mutex<BoxedReader>>,
    writer: Arc<Mutex<BoxedWriter>>,
}

impl ProtocolPeer {
    /// Create a peer over an inbound and an outbound stream.
    #[must_use]
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Arc::new(Mutex::new(BufReader::new(Box::new(reader)))),
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Peer over the process's standard input and output.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Write one message and flush it.
    ///
    /// # Errors
    /// Returns error if encoding or the write fails.
    pub async fn send(&self, message: &ProtocolMessage) -> Result<(), ProtocolError> {
        let line = message.encode()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        tracing::trace!(%line, "sent protocol message");
        Ok(())
    }

    /// Read one raw inbound line, terminator included.
    ///
    /// Returns `None` at end of stream.
    ///
    /// # Errors
    /// Returns error if the read fails.
    pub async fn read_line(&self) -> Result<Option<String>, ProtocolError> {
        let mut buffer = String::new();
        let mut reader = self.reader.lock().await;
        match reader.read_line(&mut buffer).await? {
            0 => Ok(None),
            _ => Ok(Some(buffer)),
        }
    }

    /// Read the reply to an input request.
    ///
    /// End of stream yields an empty reply.
    ///
    /// # Errors
    /// Returns error if the read fails.
    pub async fn read_response(&self) -> Result<InputResponse, ProtocolError> {
        Ok(self
            .read_line()
            .await?
            .map(|line| InputResponse::decode(&line))
            .unwrap_or_default())
    }
}

/// Revocable access to a peer.
///
/// Engines may keep their primitives alive past the end of a run (an
/// interpreter can hold closures in module state it never frees). Once
/// revoked, every clone of the lease lets go of the peer, so the outbound
/// writer closes when the session does.
#[derive(Clone)]
pub struct PeerLease {
    slot: Arc<std::sync::Mutex<Option<ProtocolPeer>>>,
}

impl PeerLease {
    #[must_use]
    pub fn new(peer: ProtocolPeer) -> Self {
        Self {
            slot: Arc::new(std::sync::Mutex::new(Some(peer))),
        }
    }

    /// The leased peer.
    ///
    /// # Errors
    /// Returns `ProtocolError::Closed` once the lease is revoked.
    pub fn peer(&self) -> Result<ProtocolPeer, ProtocolError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ProtocolError::Closed)
    }

    /// Drop the peer for every holder of this lease.
    pub fn revoke(&self) {
        if self.slot.lock().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            tracing::trace!("peer lease revoked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;

    #[test]
    fn test_output_encoding() {
        let line = ProtocolMessage::output("hi").encode().unwrap();
        assert_eq!(line, r#"{"type":"output","content":"hi"}"#);
    }

    #[test]
    fn test_input_request_uses_camel_case_session_id() {
        let line = ProtocolMessage::input_request("name: ", "abc")
            .encode()
            .unwrap();
        assert_eq!(
            line,
            r#"{"type":"input_request","prompt":"name: ","sessionId":"abc"}"#
        );
    }

    #[test]
    fn test_multiline_content_stays_on_one_line() {
        let msg = ProtocolMessage::error("Traceback:\n  File x\nValueError: bad");
        let line = msg.encode().unwrap();
        assert!(!line.contains('\n'));

        let parsed: ProtocolMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_decode_strips_terminators() {
        assert_eq!(InputResponse::decode("Ada\n").into_inner(), "Ada");
        assert_eq!(InputResponse::decode("Ada\r\n").into_inner(), "Ada");
        assert_eq!(InputResponse::decode("  Ada  \n").into_inner(), "  Ada  ");
        assert_eq!(InputResponse::decode("").into_inner(), "");
    }

    #[tokio::test]
    async fn test_send_writes_one_flushed_line_per_message() {
        let (client, mut server) = tokio::io::duplex(4096);
        let peer = ProtocolPeer::new(tokio::io::empty(), client);

        peer.send(&ProtocolMessage::output("a")).await.unwrap();
        peer.send(&ProtocolMessage::error("b\nc")).await.unwrap();
        drop(peer);

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], r#"{"type":"error","content":"b\nc"}"#);
    }

    #[tokio::test]
    async fn test_read_response_at_eof_is_empty() {
        let peer = ProtocolPeer::new(&b"first\n"[..], tokio::io::sink());

        assert_eq!(peer.read_response().await.unwrap().into_inner(), "first");
        assert_eq!(peer.read_response().await.unwrap().into_inner(), "");
    }

    #[tokio::test]
    async fn test_revoked_lease_releases_writer() {
        let (client, mut server) = tokio::io::duplex(4096);
        let lease = PeerLease::new(ProtocolPeer::new(tokio::io::empty(), client));
        let held = lease.clone();

        held.peer().unwrap().send(&ProtocolMessage::output("a")).await.unwrap();
        lease.revoke();

        assert!(matches!(held.peer(), Err(ProtocolError::Closed)));
        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "{\"type\":\"output\",\"content\":\"a\"}\n");
    }
}
