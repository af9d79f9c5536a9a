//! Relay Transport Layer
//!
//! The connection channel between endpoints and the hub. It handles:
//! - Connection lifecycle (open, frame, error, close)
//! - Decoding text frames into typed events
//! - Draining each connection's outbox back onto its socket
//! - A landing page and a `/health` endpoint
//!
//! The transport is decoupled from the hub via the `ConnectionHandler` trait.

pub mod channel;
pub mod error;
pub mod server;

pub use channel::{ChannelHandle, ChannelId};
pub use error::TransportError;
pub use server::{ConnectionHandler, TransportConfig, TransportServer};
