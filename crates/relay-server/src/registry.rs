//! Registry — the live devices and controllers, keyed by channel id.
//!
//! Two insertion-ordered maps, one per endpoint class. An id is never in
//! both. A controller's binding may outlive the device it points at; that
//! dangling reference is only noticed by [`Registry::resolve_target`].

use indexmap::IndexMap;
use relay_protocol::DeviceSummary;
use relay_transport::{ChannelHandle, ChannelId};
use thiserror::Error;

/// A registered device (controlled endpoint).
#[derive(Debug, Clone)]
pub struct ControlledEndpoint {
    pub id: ChannelId,
    pub display_name: String,
    pub channel: ChannelHandle,
}

/// A registered controller and its current binding.
#[derive(Debug, Clone)]
pub struct ControllerEndpoint {
    pub id: ChannelId,
    pub channel: ChannelHandle,
    pub bound_target_id: Option<ChannelId>,
}

/// Which collection an id was removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removed {
    Device,
    Controller,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("target {0} not found")]
pub struct TargetNotFound(pub ChannelId);

/// Why a controller's commands cannot currently be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The caller is not a controller, or has not selected a device.
    #[error("no target selected")]
    NoTargetSelected,
    /// The selected device has disconnected.
    #[error("target {0} is gone")]
    TargetGone(ChannelId),
}

#[derive(Debug, Default)]
pub struct Registry {
    devices: IndexMap<ChannelId, ControlledEndpoint>,
    controllers: IndexMap<ChannelId, ControllerEndpoint>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a device. Re-registering keeps the device's place
    /// in the roster and replaces its display name.
    pub fn register_device(
        &mut self,
        channel: &ChannelHandle,
        display_name: impl Into<String>,
    ) -> &ControlledEndpoint {
        let id = channel.id().clone();
        self.controllers.shift_remove(&id);

        let endpoint = ControlledEndpoint {
            id: id.clone(),
            display_name: display_name.into(),
            channel: channel.clone(),
        };
        let (index, _) = self.devices.insert_full(id, endpoint);
        &self.devices[index]
    }

    /// Insert or overwrite a controller with no binding.
    pub fn register_controller(&mut self, channel: &ChannelHandle) -> &ControllerEndpoint {
        let id = channel.id().clone();
        self.devices.shift_remove(&id);

        let endpoint = ControllerEndpoint {
            id: id.clone(),
            channel: channel.clone(),
            bound_target_id: None,
        };
        let (index, _) = self.controllers.insert_full(id, endpoint);
        &self.controllers[index]
    }

    /// Bind controller `id` to device `target`. Nothing changes on failure.
    pub fn bind_controller(&mut self, id: &ChannelId, target: &ChannelId) -> Result<(), TargetNotFound> {
        if !self.devices.contains_key(target) {
            return Err(TargetNotFound(target.clone()));
        }
        let controller = self
            .controllers
            .get_mut(id)
            .ok_or_else(|| TargetNotFound(target.clone()))?;
        controller.bound_target_id = Some(target.clone());
        Ok(())
    }

    /// The device controller `id` is bound to.
    pub fn resolve_target(&self, id: &ChannelId) -> Result<&ControlledEndpoint, ResolveError> {
        let target = self
            .controllers
            .get(id)
            .and_then(|c| c.bound_target_id.as_ref())
            .ok_or(ResolveError::NoTargetSelected)?;
        self.devices
            .get(target)
            .ok_or_else(|| ResolveError::TargetGone(target.clone()))
    }

    /// Forget `id`, whichever class it registered as. Safe to repeat.
    pub fn remove_endpoint(&mut self, id: &ChannelId) -> Removed {
        if self.devices.shift_remove(id).is_some() {
            Removed::Device
        } else if self.controllers.shift_remove(id).is_some() {
            Removed::Controller
        } else {
            Removed::None
        }
    }

    /// Roster snapshot in registration order.
    pub fn list_devices(&self) -> Vec<DeviceSummary> {
        self.devices
            .values()
            .map(|d| DeviceSummary {
                id: d.id.to_string(),
                display_name: d.display_name.clone(),
            })
            .collect()
    }

    pub fn device(&self, id: &ChannelId) -> Option<&ControlledEndpoint> {
        self.devices.get(id)
    }

    pub fn controller(&self, id: &ChannelId) -> Option<&ControllerEndpoint> {
        self.controllers.get(id)
    }

    pub fn controllers(&self) -> impl Iterator<Item = &ControllerEndpoint> {
        self.controllers.values()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }
}
