//! Errors raised while starting the transport.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid listen address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid WebSocket path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
