//! Config sync: push saved configuration to devices as they identify, and
//! persist-then-forward user configuration requests.

use std::sync::Arc;

use hearth_channels::Channel;
use hearth_core::protocol::{DeviceConfiguration, DeviceIdentity, WirePayload};
use hearth_core::stores::ConfigStore;
use hearth_sessions::{Device, DeviceManager, DeviceObserver, User, UserManager, UserObserver};
use tracing::{debug, warn};

use crate::Router;

/// Keeps devices and the configuration store in sync.
pub struct ConfigRouter {
    devices: Arc<DeviceManager>,
    configs: Arc<dyn ConfigStore>,
}

impl ConfigRouter {
    /// Router name.
    pub const NAME: &'static str = "config";

    /// Build the router.
    pub fn new(devices: Arc<DeviceManager>, configs: Arc<dyn ConfigStore>) -> Arc<Self> {
        Arc::new(Self { devices, configs })
    }
}

impl Router for ConfigRouter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self: Arc<Self>, devices: &DeviceManager, users: &UserManager) {
        devices.register_observer(Arc::clone(&self) as Arc<dyn DeviceObserver>);
        users.register_observer(self as Arc<dyn UserObserver>);
    }
}

impl DeviceObserver for ConfigRouter {
    fn identity_established(&self, device: &Arc<Device>, identity: &DeviceIdentity) {
        if let Some(config) = self.configs.get(&identity.serial) {
            debug!(serial = identity.serial, "pushing saved configuration to device");
            device.channel().write(&WirePayload::Config(config));
        }
    }
}

impl UserObserver for ConfigRouter {
    fn config_submitted(&self, _user: &Arc<User>, config: &DeviceConfiguration) {
        if self.configs.save(&config.serial, config) {
            debug!(serial = config.serial, "configuration persisted");
        } else {
            warn!(serial = config.serial, "configuration could not be persisted");
        }
        // Forwarded unconditionally, persisted or not.
        self.devices
            .send(&config.serial, &WirePayload::Config(config.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_channels::{MemoryChannel, MemoryChannelManager};
    use hearth_core::stores::{MemoryAccessStore, MemoryConfigStore};
    use serde_json::{json, Map};

    struct Rig {
        configs: Arc<MemoryConfigStore>,
        device_channels: Arc<MemoryChannelManager>,
        user_channels: Arc<MemoryChannelManager>,
    }

    fn rig() -> Rig {
        let devices = DeviceManager::new();
        let users = UserManager::new(Arc::new(MemoryAccessStore::new()));
        let configs = Arc::new(MemoryConfigStore::new());
        ConfigRouter::new(Arc::clone(&devices), configs.clone() as Arc<dyn ConfigStore>)
            .register(&devices, &users);

        let device_channels = MemoryChannelManager::new();
        devices.register_channel_manager(device_channels.as_ref());
        let user_channels = MemoryChannelManager::new();
        users.register_channel_manager(user_channels.as_ref());
        Rig {
            configs,
            device_channels,
            user_channels,
        }
    }

    fn saved_config(serial: &str) -> DeviceConfiguration {
        let mut map = Map::new();
        let _ = map.insert("dim".into(), json!(40));
        DeviceConfiguration {
            serial: serial.into(),
            config: map,
        }
    }

    #[tokio::test]
    async fn saved_config_pushed_on_identify() {
        let rig = rig();
        assert!(rig.configs.save("ABC", &saved_config("ABC")));

        let (channel, mut rx) = MemoryChannel::new("mem:device");
        rig.device_channels.add(Arc::clone(&channel));
        let _identity_request = rx.recv().await.unwrap();

        channel.push(&json!({"serial": "ABC", "props": {}}).to_string());

        // Identity triggers the config push and then the status request.
        let mut frames = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        frames.sort();
        assert!(frames.iter().any(|f| f.contains("\"dim\":40")));
    }

    #[tokio::test]
    async fn no_push_without_saved_config() {
        let rig = rig();
        let (channel, mut rx) = MemoryChannel::new("mem:device");
        rig.device_channels.add(Arc::clone(&channel));
        let _identity_request = rx.recv().await.unwrap();

        channel.push(&json!({"serial": "ABC", "props": {}}).to_string());
        // Only the status request follows the identity.
        let frame = rx.recv().await.unwrap();
        assert!(frame.contains("\"request\":\"status\""));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn user_config_is_persisted_and_forwarded() {
        let rig = rig();

        let (device_channel, mut device_rx) = MemoryChannel::new("mem:device");
        rig.device_channels.add(Arc::clone(&device_channel));
        let _identity_request = device_rx.recv().await.unwrap();
        device_channel.push(&json!({"serial": "ABC", "props": {}}).to_string());
        let _status_request = device_rx.recv().await.unwrap();

        let (user_channel, _user_rx) = MemoryChannel::new("mem:user");
        rig.user_channels.add(Arc::clone(&user_channel));

        user_channel.push(&json!({"serial": "ABC", "config": {"dim": 80}}).to_string());

        assert_eq!(rig.configs.get("ABC").unwrap().config["dim"], json!(80));
        let forwarded = device_rx.recv().await.unwrap();
        assert!(forwarded.contains("\"dim\":80"));
    }

    #[tokio::test]
    async fn user_config_for_unknown_device_still_persists() {
        let rig = rig();
        let (user_channel, _user_rx) = MemoryChannel::new("mem:user");
        rig.user_channels.add(Arc::clone(&user_channel));

        user_channel.push(&json!({"serial": "GHOST", "config": {"dim": 80}}).to_string());
        assert!(rig.configs.get("GHOST").is_some());
    }
}
