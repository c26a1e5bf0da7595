//! Event fan-out: targeted and subscription-based delivery between
//! devices, plus the cloud notification bridge.

use std::sync::Arc;

use hearth_channels::Channel;
use hearth_core::protocol::{DeviceEvent, WirePayload};
use hearth_core::stores::CloudBridge;
use hearth_sessions::{Device, DeviceManager, DeviceObserver, UserManager};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Router;

/// Event name the cloud bridge watches for.
const CLOUD_SECURITY_EVENT: &str = "house.security";

/// Event name forwarded to the cloud when the house opens.
const CLOUD_OPEN_EVENT: &str = "house.open";

/// Delivers device events per the subscription rule: a targeted event goes
/// to its target iff the target listens for it; an untargeted event goes to
/// every identity-bearing device that listens for it.
pub struct EventRouter {
    devices: Arc<DeviceManager>,
    cloud: Arc<dyn CloudBridge>,
}

impl EventRouter {
    /// Router name.
    pub const NAME: &'static str = "event";

    /// Build the router.
    pub fn new(devices: Arc<DeviceManager>, cloud: Arc<dyn CloudBridge>) -> Arc<Self> {
        Arc::new(Self { devices, cloud })
    }

    fn handle_cloud_event(&self, event: &DeviceEvent) {
        if event.name != CLOUD_SECURITY_EVENT {
            return;
        }
        if event.arguments.get("open").and_then(Value::as_bool) == Some(true) {
            info!(event = CLOUD_OPEN_EVENT, "emitting cloud event");
            self.cloud.send_event(CLOUD_OPEN_EVENT);
        }
    }
}

impl Router for EventRouter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self: Arc<Self>, devices: &DeviceManager, _users: &UserManager) {
        devices.register_observer(self);
    }
}

impl DeviceObserver for EventRouter {
    fn event_raised(&self, _device: &Arc<Device>, event: &DeviceEvent) {
        info!(name = event.name, source = event.serial, "device event received");
        self.handle_cloud_event(event);

        match event.target.as_deref() {
            Some(target) => {
                let Some(device) = self.devices.get(target) else {
                    warn!(name = event.name, target, "event target not connected, dropped");
                    return;
                };
                let Some(identity) = device.identity() else {
                    return;
                };
                if !identity.listens_to(&event.name) {
                    info!(name = event.name, target, "event target does not listen, dropped");
                    return;
                }
                debug!(name = event.name, target, "forwarding targeted event");
                device.channel().write(&WirePayload::Event(event.clone()));
            }
            None => {
                let listeners: Vec<Arc<Device>> = self
                    .devices
                    .devices()
                    .into_iter()
                    .filter(|device| {
                        device
                            .identity()
                            .is_some_and(|identity| identity.listens_to(&event.name))
                    })
                    .collect();
                if listeners.is_empty() {
                    info!(name = event.name, "no devices listen for event, dropped");
                    return;
                }
                debug!(
                    name = event.name,
                    listeners = listeners.len(),
                    "broadcasting event to listeners"
                );
                for device in listeners {
                    device.channel().write(&WirePayload::Event(event.clone()));
                }
            }
        }
    }
}
