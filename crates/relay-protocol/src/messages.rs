//! Typed payloads for every inbound event and outbound message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::events::{EventName, Events};

/// Display name given to a device that registers without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Unnamed Device";

/// Human-readable `error` messages sent back to a misbehaving caller.
pub struct ErrorMessages;

impl ErrorMessages {
    pub const TARGET_NOT_FOUND: &str = "target not found";
    pub const NO_TARGET_SELECTED: &str = "no target selected";
    pub const TARGET_GONE: &str = "target gone";
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint → Hub
// ─────────────────────────────────────────────────────────────────────────────

/// The two classes of endpoint the hub knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A controlled endpoint that receives relayed commands.
    Device,
    /// An endpoint that selects a device and sends it commands.
    Controller,
}

impl Role {
    /// Parse the `as` field of a `register` event. Accepts the legacy
    /// `android`/`pc` spellings.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "device" | "android" => Some(Self::Device),
            "controller" | "pc" => Some(Self::Controller),
            _ => None,
        }
    }
}

/// Parameters of `register`.
///
/// `as` stays a raw string: an unrecognised role is not a decoding error,
/// the hub simply ignores the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterParams {
    #[serde(rename = "as", default)]
    pub role: String,
    #[serde(
        rename = "displayName",
        alias = "deviceName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

impl RegisterParams {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Parameters of `selectTarget`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectTargetParams {
    #[serde(rename = "targetId", default)]
    pub target_id: String,
}

/// A decoded application event from an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Register(RegisterParams),
    SelectTarget(SelectTargetParams),
    /// Opaque command descriptor, relayed verbatim.
    RelayCommand(Value),
}

impl InboundEvent {
    /// Decode an envelope into a typed event, resolving legacy aliases.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Envelope { event, data } = envelope;
        match event.as_str() {
            Events::REGISTER => Ok(Self::Register(decode_params(&event, data)?)),
            Events::SELECT_TARGET | Events::SELECT_ANDROID => {
                Ok(Self::SelectTarget(decode_params(&event, data)?))
            }
            Events::RELAY_COMMAND | Events::ADB_COMMAND => {
                Ok(Self::RelayCommand(data.unwrap_or(Value::Null)))
            }
            _ => Err(ProtocolError::UnknownEvent(event)),
        }
    }

    /// Canonical event name, after alias resolution.
    pub fn name(&self) -> EventName {
        match self {
            Self::Register(_) => Events::REGISTER,
            Self::SelectTarget(_) => Events::SELECT_TARGET,
            Self::RelayCommand(_) => Events::RELAY_COMMAND,
        }
    }
}

/// Missing or `null` data decodes to the default parameters.
fn decode_params<T: DeserializeOwned + Default>(
    event: &str,
    data: Option<Value>,
) -> Result<T, ProtocolError> {
    match data {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload {
            event: event.to_string(),
            source,
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hub → Endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Reply to a successful `register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredReply {
    pub status: String,
    /// Only present when acknowledging a device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One entry of the device roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListParams {
    pub devices: Vec<DeviceSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionChangedParams {
    #[serde(rename = "selectedId")]
    pub selected_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorParams {
    pub message: String,
}

/// A message the hub sends to one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Registered(RegisteredReply),
    DeviceList(DeviceListParams),
    SelectionChanged(SelectionChangedParams),
    /// The controller's payload, untouched.
    Command(Value),
    Error(ErrorParams),
}

impl OutboundMessage {
    pub fn registered(id: Option<String>) -> Self {
        Self::Registered(RegisteredReply {
            status: "success".into(),
            id,
        })
    }

    pub fn device_list(devices: Vec<DeviceSummary>) -> Self {
        Self::DeviceList(DeviceListParams { devices })
    }

    pub fn selection_changed(selected_id: impl Into<String>) -> Self {
        Self::SelectionChanged(SelectionChangedParams {
            selected_id: selected_id.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorParams {
            message: message.into(),
        })
    }

    pub fn name(&self) -> EventName {
        match self {
            Self::Registered(_) => Events::REGISTERED,
            Self::DeviceList(_) => Events::DEVICE_LIST,
            Self::SelectionChanged(_) => Events::SELECTION_CHANGED,
            Self::Command(_) => Events::COMMAND,
            Self::Error(_) => Events::ERROR,
        }
    }

    pub fn into_envelope(self) -> Result<Envelope, ProtocolError> {
        let name = self.name();
        let data = match self {
            Self::Registered(reply) => to_data(name, reply)?,
            Self::DeviceList(params) => to_data(name, params)?,
            Self::SelectionChanged(params) => to_data(name, params)?,
            Self::Error(params) => to_data(name, params)?,
            Self::Command(Value::Null) => None,
            Self::Command(payload) => Some(payload),
        };
        Ok(Envelope::new(name, data))
    }
}

fn to_data<T: Serialize>(event: &str, value: T) -> Result<Option<Value>, ProtocolError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|source| ProtocolError::InvalidPayload {
            event: event.to_string(),
            source,
        })
}
