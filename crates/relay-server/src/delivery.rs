//! An outbound message addressed to one connection.

use relay_protocol::OutboundMessage;
use relay_transport::{ChannelHandle, ChannelId};

#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: ChannelHandle,
    pub message: OutboundMessage,
}

impl Delivery {
    pub fn to(channel: &ChannelHandle, message: OutboundMessage) -> Self {
        Self {
            channel: channel.clone(),
            message,
        }
    }

    pub fn recipient(&self) -> &ChannelId {
        self.channel.id()
    }

    /// Hand the message to the recipient's outbox. Returns `false` if the
    /// recipient has already disconnected.
    pub fn send(self) -> bool {
        self.channel.send(self.message)
    }
}
