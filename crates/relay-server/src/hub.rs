//! Hub — the single writer in front of the relay engine.
//!
//! Connection tasks run concurrently, so every event they report is queued
//! onto one channel and applied by one task. An event is fully processed,
//! including all of its sends, before the next one is looked at.

use relay_protocol::InboundEvent;
use relay_transport::{ChannelHandle, ChannelId, ConnectionHandler};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::router::{HubEvent, HubStats, RelayEngine};

enum HubCommand {
    Event(HubEvent),
    Stats(oneshot::Sender<HubStats>),
}

/// Cheap, cloneable handle to the hub task.
#[derive(Debug, Clone)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Spawn the hub task around `engine`. The task exits once every `Hub`
    /// handle has been dropped and hands the engine back.
    pub fn spawn(engine: RelayEngine) -> (Self, JoinHandle<RelayEngine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(engine, rx));
        (Self { tx }, handle)
    }

    /// Queue an event for processing.
    pub fn submit(&self, event: HubEvent) {
        if self.tx.send(HubCommand::Event(event)).is_err() {
            warn!("Hub is not running; event dropped");
        }
    }

    /// Current registry sizes, or `None` if the hub has stopped.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(HubCommand::Stats(reply_tx)).ok()?;
        reply_rx.await.ok()
    }
}

async fn run(mut engine: RelayEngine, mut rx: mpsc::UnboundedReceiver<HubCommand>) -> RelayEngine {
    info!("Relay hub started");
    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Event(event) => {
                for delivery in engine.dispatch(event) {
                    let recipient = delivery.recipient().clone();
                    if !delivery.send() {
                        debug!("Recipient {recipient} already closed");
                    }
                }
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(engine.stats());
            }
        }
    }
    info!("Relay hub stopped");
    engine
}

impl ConnectionHandler for Hub {
    fn on_event(&self, channel: &ChannelHandle, event: InboundEvent) {
        self.submit(HubEvent::Message {
            channel: channel.clone(),
            event,
        });
    }

    fn on_error(&self, id: &ChannelId, reason: String) {
        self.submit(HubEvent::ChannelError {
            id: id.clone(),
            reason,
        });
    }

    fn on_disconnect(&self, id: &ChannelId) {
        self.submit(HubEvent::Teardown(id.clone()));
    }

    async fn health(&self) -> Value {
        match self.stats().await {
            Some(stats) => serde_json::to_value(stats).unwrap_or(Value::Null),
            None => Value::Null,
        }
    }
}
