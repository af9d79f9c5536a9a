//! Per-connection identity and outbound handle.
//!
//! A [`ChannelId`] names a connection for its whole lifetime and is never
//! reused. A [`ChannelHandle`] pairs that id with the connection's outbox so
//! other subsystems can send to it without touching the socket.

use std::fmt;
use std::time::Instant;

use relay_protocol::{Envelope, OutboundMessage};
use tokio::sync::mpsc;
use tracing::error;

/// Opaque identifier assigned to a connection when it opens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    /// A fresh, random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sending side of one connection.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ChannelId,
    outbox: mpsc::UnboundedSender<Envelope>,
    connected_at: Instant,
}

impl ChannelHandle {
    pub fn new(id: ChannelId, outbox: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            id,
            outbox,
            connected_at: Instant::now(),
        }
    }

    /// Open a handle with a fresh id, returning the outbox receiver that the
    /// connection task drains onto the socket.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(ChannelId::generate(), tx), rx)
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// When the connection was accepted. Clones share it.
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Queue a message for this connection. Returns `false` if the connection
    /// has already gone away; the message is dropped.
    pub fn send(&self, message: OutboundMessage) -> bool {
        match message.into_envelope() {
            Ok(envelope) => self.outbox.send(envelope).is_ok(),
            Err(e) => {
                error!("Failed to encode message for {}: {e}", self.id);
                false
            }
        }
    }

}
