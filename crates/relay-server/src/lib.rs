//! Relay Server — the rendezvous hub between controllers and devices.
//!
//! The registry holds who is connected, the relay engine applies the
//! protocol to it, and the hub serializes every connection's events onto
//! a single task. `Hub` implements the transport's `ConnectionHandler`.

pub mod broadcast;
pub mod delivery;
pub mod hub;
pub mod registry;
pub mod router;

pub use delivery::Delivery;
pub use hub::Hub;
pub use registry::{ControlledEndpoint, ControllerEndpoint, Registry, Removed, ResolveError, TargetNotFound};
pub use router::{HubEvent, HubStats, RelayEngine};
