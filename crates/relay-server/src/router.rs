//! Relay engine — dispatches hub events against the registry.
//!
//! Each call processes exactly one event and returns the deliveries it
//! produced. The engine never performs I/O itself.

use relay_protocol::{
    DEFAULT_DISPLAY_NAME, ErrorMessages, InboundEvent, OutboundMessage, RegisterParams, Role,
    SelectTargetParams,
};
use relay_transport::{ChannelHandle, ChannelId};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::broadcast::broadcast_device_roster;
use crate::delivery::Delivery;
use crate::registry::{Registry, Removed, ResolveError};

/// Everything the hub reacts to.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// An application event from a connection.
    Message {
        channel: ChannelHandle,
        event: InboundEvent,
    },
    /// The connection closed.
    Teardown(ChannelId),
    /// The connection reported a transport error.
    ChannelError { id: ChannelId, reason: String },
}

/// Registry sizes, for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub devices: usize,
    pub controllers: usize,
}

/// The protocol state machine. Owns the registry exclusively.
#[derive(Debug, Default)]
pub struct RelayEngine {
    registry: Registry,
}

impl RelayEngine {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            devices: self.registry.device_count(),
            controllers: self.registry.controller_count(),
        }
    }

    /// Process one event.
    pub fn dispatch(&mut self, event: HubEvent) -> Vec<Delivery> {
        match event {
            HubEvent::Message { channel, event } => self.handle(&channel, event),
            HubEvent::Teardown(id) => self.teardown(&id),
            HubEvent::ChannelError { id, reason } => {
                error!("Channel error for {id}: {reason}");
                Vec::new()
            }
        }
    }

    /// Process one application event from `channel`.
    pub fn handle(&mut self, channel: &ChannelHandle, event: InboundEvent) -> Vec<Delivery> {
        match event {
            InboundEvent::Register(params) => self.register(channel, params),
            InboundEvent::SelectTarget(params) => self.select_target(channel, params),
            InboundEvent::RelayCommand(payload) => self.relay_command(channel, payload),
        }
    }

    /// Forget a closed connection. Repeating it is harmless.
    pub fn teardown(&mut self, id: &ChannelId) -> Vec<Delivery> {
        match self.registry.remove_endpoint(id) {
            Removed::Device => {
                info!("Device disconnected: {id}");
                broadcast_device_roster(&self.registry)
            }
            Removed::Controller => {
                info!("Controller disconnected: {id}");
                Vec::new()
            }
            Removed::None => {
                debug!("Unregistered channel closed: {id}");
                Vec::new()
            }
        }
    }

    fn register(&mut self, channel: &ChannelHandle, params: RegisterParams) -> Vec<Delivery> {
        let id = channel.id();
        let Some(role) = params.role() else {
            debug!("Ignoring register from {id} with unknown role {:?}", params.role);
            return Vec::new();
        };

        match role {
            Role::Device => {
                let name = params
                    .display_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
                let device = self.registry.register_device(channel, name);
                info!("Device registered: {} ({})", device.id, device.display_name);

                let mut out = vec![Delivery::to(
                    channel,
                    OutboundMessage::registered(Some(id.to_string())),
                )];
                out.extend(broadcast_device_roster(&self.registry));
                out
            }
            Role::Controller => {
                let was_device = self.registry.device(id).is_some();
                self.registry.register_controller(channel);
                info!("Controller registered: {id}");

                let mut out = vec![Delivery::to(channel, OutboundMessage::registered(None))];
                if was_device {
                    // The roster lost a member; everyone hears about it,
                    // including the new controller.
                    out.extend(broadcast_device_roster(&self.registry));
                } else {
                    out.push(Delivery::to(
                        channel,
                        OutboundMessage::device_list(self.registry.list_devices()),
                    ));
                }
                out
            }
        }
    }

    fn select_target(&mut self, channel: &ChannelHandle, params: SelectTargetParams) -> Vec<Delivery> {
        let id = channel.id();
        if self.registry.controller(id).is_none() {
            debug!("Dropping selectTarget from non-controller {id}");
            return Vec::new();
        }

        let target = ChannelId::from(params.target_id);
        match self.registry.bind_controller(id, &target) {
            Ok(()) => {
                info!("Controller {id} selected device {target}");
                vec![Delivery::to(
                    channel,
                    OutboundMessage::selection_changed(target.to_string()),
                )]
            }
            Err(e) => {
                debug!("Controller {id} selection failed: {e}");
                vec![Delivery::to(
                    channel,
                    OutboundMessage::error(ErrorMessages::TARGET_NOT_FOUND),
                )]
            }
        }
    }

    fn relay_command(&mut self, channel: &ChannelHandle, payload: Value) -> Vec<Delivery> {
        let id = channel.id();
        match self.registry.resolve_target(id) {
            Ok(device) => {
                debug!("Relaying command from {id} to {}", device.id);
                vec![Delivery::to(&device.channel, OutboundMessage::Command(payload))]
            }
            Err(e) => {
                debug!("Relay from {id} failed: {e}");
                let message = match e {
                    ResolveError::NoTargetSelected => ErrorMessages::NO_TARGET_SELECTED,
                    ResolveError::TargetGone(_) => ErrorMessages::TARGET_GONE,
                };
                vec![Delivery::to(channel, OutboundMessage::error(message))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::DeviceSummary;
    use serde_json::json;

    fn endpoint() -> ChannelHandle {
        ChannelHandle::open().0
    }

    fn register(engine: &mut RelayEngine, channel: &ChannelHandle, role: &str, name: Option<&str>) -> Vec<Delivery> {
        engine.handle(
            channel,
            InboundEvent::Register(RegisterParams {
                role: role.into(),
                display_name: name.map(String::from),
            }),
        )
    }

    fn select(engine: &mut RelayEngine, channel: &ChannelHandle, target: &ChannelId) -> Vec<Delivery> {
        engine.handle(
            channel,
            InboundEvent::SelectTarget(SelectTargetParams {
                target_id: target.to_string(),
            }),
        )
    }

    fn relay(engine: &mut RelayEngine, channel: &ChannelHandle, payload: Value) -> Vec<Delivery> {
        engine.handle(channel, InboundEvent::RelayCommand(payload))
    }

    fn summary(id: &ChannelId, name: &str) -> DeviceSummary {
        DeviceSummary {
            id: id.to_string(),
            display_name: name.into(),
        }
    }

    #[test]
    fn device_registration_replies_with_id_and_broadcasts() {
        let mut engine = RelayEngine::default();
        let pc = endpoint();
        register(&mut engine, &pc, "controller", None);

        let device = endpoint();
        let out = register(&mut engine, &device, "device", Some("Pixel7"));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].recipient(), device.id());
        assert_eq!(out[0].message, OutboundMessage::registered(Some(device.id().to_string())));
        assert_eq!(out[1].recipient(), pc.id());
        assert_eq!(
            out[1].message,
            OutboundMessage::device_list(vec![summary(device.id(), "Pixel7")])
        );
    }

    #[test]
    fn missing_or_empty_display_name_uses_placeholder() {
        let mut engine = RelayEngine::default();
        let a = endpoint();
        let b = endpoint();
        register(&mut engine, &a, "device", None);
        register(&mut engine, &b, "device", Some(""));

        let roster = engine.registry().list_devices();
        assert!(roster.iter().all(|d| d.display_name == DEFAULT_DISPLAY_NAME));
    }

    #[test]
    fn controller_registration_replies_and_sends_current_roster() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        register(&mut engine, &device, "device", Some("Pixel7"));

        let pc = endpoint();
        let out = register(&mut engine, &pc, "controller", None);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| d.recipient() == pc.id()));
        assert_eq!(out[0].message, OutboundMessage::registered(None));
        assert_eq!(
            out[1].message,
            OutboundMessage::device_list(vec![summary(device.id(), "Pixel7")])
        );
    }

    #[test]
    fn two_controllers_receive_identical_roster() {
        let mut engine = RelayEngine::default();
        let pc1 = endpoint();
        let pc2 = endpoint();
        register(&mut engine, &pc1, "controller", None);
        register(&mut engine, &pc2, "controller", None);

        let device = endpoint();
        let out = register(&mut engine, &device, "device", None);
        let expected = OutboundMessage::device_list(vec![summary(device.id(), "Unnamed Device")]);

        let broadcasts: Vec<_> = out.iter().filter(|d| d.recipient() != device.id()).collect();
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0].recipient(), pc1.id());
        assert_eq!(broadcasts[1].recipient(), pc2.id());
        assert!(broadcasts.iter().all(|d| d.message == expected));
    }

    #[test]
    fn unknown_role_is_silently_ignored() {
        let mut engine = RelayEngine::default();
        let x = endpoint();
        assert!(register(&mut engine, &x, "toaster", Some("x")).is_empty());
        assert!(register(&mut engine, &x, "", None).is_empty());
        assert_eq!(engine.stats(), HubStats { devices: 0, controllers: 0 });
    }

    #[test]
    fn device_that_becomes_controller_leaves_roster() {
        let mut engine = RelayEngine::default();
        let watcher = endpoint();
        let x = endpoint();
        register(&mut engine, &watcher, "controller", None);
        register(&mut engine, &x, "device", None);

        let out = register(&mut engine, &x, "controller", None);
        let empty = OutboundMessage::device_list(Vec::new());
        assert_eq!(out[0].message, OutboundMessage::registered(None));
        let lists: Vec<_> = out[1..].iter().map(|d| d.recipient().clone()).collect();
        assert_eq!(lists, vec![watcher.id().clone(), x.id().clone()]);
        assert!(out[1..].iter().all(|d| d.message == empty));
        assert_eq!(engine.stats(), HubStats { devices: 0, controllers: 2 });
    }

    #[test]
    fn select_target_binds_and_confirms() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        let pc = endpoint();
        register(&mut engine, &device, "device", None);
        register(&mut engine, &pc, "controller", None);

        let out = select(&mut engine, &pc, device.id());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient(), pc.id());
        assert_eq!(out[0].message, OutboundMessage::selection_changed(device.id().to_string()));
    }

    #[test]
    fn select_unknown_target_reports_error_without_change() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        let pc = endpoint();
        register(&mut engine, &device, "device", None);
        register(&mut engine, &pc, "controller", None);
        select(&mut engine, &pc, device.id());

        let out = select(&mut engine, &pc, &ChannelId::from("missing"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, OutboundMessage::error("target not found"));
        assert_eq!(
            engine.registry().controller(pc.id()).unwrap().bound_target_id.as_ref(),
            Some(device.id())
        );
    }

    #[test]
    fn select_from_non_controller_is_dropped() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        let other = endpoint();
        let stranger = endpoint();
        register(&mut engine, &device, "device", None);
        register(&mut engine, &other, "device", None);

        assert!(select(&mut engine, &stranger, device.id()).is_empty());
        assert!(select(&mut engine, &other, device.id()).is_empty());
    }

    #[test]
    fn pixel7_tap_is_relayed_verbatim() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        let pc = endpoint();
        register(&mut engine, &device, "device", Some("Pixel7"));
        register(&mut engine, &pc, "controller", None);
        select(&mut engine, &pc, device.id());

        let payload = json!({"type": "tap", "x": 10, "y": 20});
        let out = relay(&mut engine, &pc, payload.clone());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient(), device.id());
        assert_eq!(out[0].message, OutboundMessage::Command(payload));
    }

    #[test]
    fn relay_without_selection_reports_no_target() {
        let mut engine = RelayEngine::default();
        let pc = endpoint();
        let stranger = endpoint();
        register(&mut engine, &pc, "controller", None);

        for caller in [&pc, &stranger] {
            let out = relay(&mut engine, caller, json!({"type": "tap"}));
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].recipient(), caller.id());
            assert_eq!(out[0].message, OutboundMessage::error("no target selected"));
        }
    }

    #[test]
    fn relay_to_departed_device_reports_target_gone() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        let pc = endpoint();
        register(&mut engine, &device, "device", None);
        register(&mut engine, &pc, "controller", None);
        select(&mut engine, &pc, device.id());

        let out = engine.teardown(device.id());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, OutboundMessage::device_list(Vec::new()));

        let out = relay(&mut engine, &pc, json!({"type": "home"}));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient(), pc.id());
        assert_eq!(out[0].message, OutboundMessage::error("target gone"));
        assert_ne!(out[0].message, OutboundMessage::error("no target selected"));
    }

    #[test]
    fn teardown_is_idempotent_and_quiet_the_second_time() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        let pc = endpoint();
        register(&mut engine, &pc, "controller", None);
        register(&mut engine, &device, "device", None);

        assert_eq!(engine.teardown(device.id()).len(), 1);
        assert!(engine.teardown(device.id()).is_empty());
        assert!(engine.teardown(pc.id()).is_empty());
        assert!(engine.teardown(pc.id()).is_empty());
    }

    #[test]
    fn controller_teardown_does_not_broadcast() {
        let mut engine = RelayEngine::default();
        let pc1 = endpoint();
        let pc2 = endpoint();
        register(&mut engine, &pc1, "controller", None);
        register(&mut engine, &pc2, "controller", None);
        assert!(engine.teardown(pc1.id()).is_empty());
    }

    #[test]
    fn channel_error_only_logs() {
        let mut engine = RelayEngine::default();
        let device = endpoint();
        register(&mut engine, &device, "device", None);

        let out = engine.dispatch(HubEvent::ChannelError {
            id: device.id().clone(),
            reason: "reset by peer".into(),
        });
        assert!(out.is_empty());
        assert_eq!(engine.stats().devices, 1);
    }

    #[test]
    fn roster_matches_surviving_devices_after_churn() {
        let mut engine = RelayEngine::default();
        let pc = endpoint();
        register(&mut engine, &pc, "controller", None);

        let devices: Vec<_> = (0..6).map(|_| endpoint()).collect();
        for (i, d) in devices.iter().enumerate() {
            register(&mut engine, d, "device", Some(format!("d{i}").as_str()));
        }
        let mut last = Vec::new();
        for i in [0, 2, 2, 5] {
            let out = engine.dispatch(HubEvent::Teardown(devices[i].id().clone()));
            if !out.is_empty() {
                last = out;
            }
        }

        let expected: Vec<_> = [1, 3, 4]
            .iter()
            .map(|&i| summary(devices[i].id(), &format!("d{i}")))
            .collect();
        assert_eq!(engine.registry().list_devices(), expected);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].message, OutboundMessage::device_list(expected));
    }
}
