//! Errors raised while decoding frames from an endpoint.
//!
//! None of these are fatal: the transport logs them and drops the frame.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame has no event name")]
    MissingEvent,

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid payload for `{event}`: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
