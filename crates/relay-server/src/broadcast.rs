//! Roster fan-out to every controller.

use relay_protocol::OutboundMessage;
use tracing::debug;

use crate::delivery::Delivery;
use crate::registry::Registry;

/// One identical `deviceList` per registered controller, built from a single
/// snapshot of the roster.
pub fn broadcast_device_roster(registry: &Registry) -> Vec<Delivery> {
    let devices = registry.list_devices();
    let deliveries: Vec<Delivery> = registry
        .controllers()
        .map(|c| Delivery::to(&c.channel, OutboundMessage::device_list(devices.clone())))
        .collect();

    debug!(
        "Broadcasting roster of {} device(s) to {} controller(s)",
        devices.len(),
        deliveries.len()
    );
    deliveries
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_transport::ChannelHandle;

    #[test]
    fn no_controllers_means_no_deliveries() {
        let mut registry = Registry::new();
        let (device, _rx) = ChannelHandle::open();
        registry.register_device(&device, "lonely");
        assert!(broadcast_device_roster(&registry).is_empty());
    }

    #[test]
    fn every_controller_gets_the_same_snapshot() {
        let mut registry = Registry::new();
        let (device, _d) = ChannelHandle::open();
        let (pc1, _p1) = ChannelHandle::open();
        let (pc2, _p2) = ChannelHandle::open();
        registry.register_controller(&pc1);
        registry.register_device(&device, "Pixel7");
        registry.register_controller(&pc2);

        let deliveries = broadcast_device_roster(&registry);
        let recipients: Vec<_> = deliveries.iter().map(|d| d.recipient().clone()).collect();
        assert_eq!(recipients, vec![pc1.id().clone(), pc2.id().clone()]);
        assert_eq!(deliveries[0].message, deliveries[1].message);
        assert_eq!(
            deliveries[0].message,
            OutboundMessage::device_list(registry.list_devices())
        );
    }
}
