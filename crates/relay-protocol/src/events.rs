//! Event name constants.
//!
//! Each constant is the exact string sent as the `event` field of an
//! [`Envelope`](crate::Envelope).

/// All event names, grouped by direction.
pub struct Events;

impl Events {
    // ── Endpoint → hub ──────────────────────────────────────────────────
    pub const REGISTER: &str = "register";
    pub const SELECT_TARGET: &str = "selectTarget";
    pub const RELAY_COMMAND: &str = "relayCommand";

    // ── Endpoint → hub (legacy Android/PC clients) ──────────────────────
    pub const SELECT_ANDROID: &str = "selectAndroid";
    pub const ADB_COMMAND: &str = "adbCommand";

    // ── Hub → endpoint ──────────────────────────────────────────────────
    /// Reply to `register` reuses the request's event name.
    pub const REGISTERED: &str = "register";
    pub const DEVICE_LIST: &str = "deviceList";
    pub const SELECTION_CHANGED: &str = "selectionChanged";
    pub const COMMAND: &str = "command";
    pub const ERROR: &str = "error";
}

/// Type alias for event names.
pub type EventName = &'static str;
