//! Relay Hub Protocol Types
//!
//! Every frame exchanged between an endpoint and the hub is a JSON
//! [`Envelope`] carrying an event name and an optional payload. This crate
//! is the single source of truth for event names, the typed inbound and
//! outbound messages, and protocol errors.

pub mod envelope;
pub mod error;
pub mod events;
pub mod messages;

pub use envelope::Envelope;
pub use error::ProtocolError;
pub use events::{EventName, Events};
pub use messages::{
    DeviceListParams, DeviceSummary, ErrorMessages, ErrorParams, InboundEvent,
    OutboundMessage, RegisterParams, RegisteredReply, Role, SelectTargetParams,
    SelectionChangedParams, DEFAULT_DISPLAY_NAME,
};
