//! Status fan-out: every device status update goes to every user.

use std::sync::Arc;

use hearth_core::protocol::{DeviceStatus, WirePayload};
use hearth_sessions::{Device, DeviceManager, DeviceObserver, UserManager};

use crate::Router;

/// Broadcasts device status updates to all connected users.
pub struct StatusRouter {
    users: Arc<UserManager>,
}

impl StatusRouter {
    /// Router name.
    pub const NAME: &'static str = "status";

    /// Build the router.
    pub fn new(users: Arc<UserManager>) -> Arc<Self> {
        Arc::new(Self { users })
    }
}

impl Router for StatusRouter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self: Arc<Self>, devices: &DeviceManager, _users: &UserManager) {
        devices.register_observer(self);
    }
}

impl DeviceObserver for StatusRouter {
    fn status_updated(&self, _device: &Arc<Device>, status: &DeviceStatus) {
        self.users.broadcast(&WirePayload::Status(status.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_channels::{MemoryChannel, MemoryChannelManager};
    use hearth_core::stores::MemoryAccessStore;
    use serde_json::json;

    #[tokio::test]
    async fn status_update_reaches_users() {
        let devices = DeviceManager::new();
        let users = UserManager::new(Arc::new(MemoryAccessStore::new()));
        StatusRouter::new(Arc::clone(&users)).register(&devices, &users);

        let device_channels = MemoryChannelManager::new();
        devices.register_channel_manager(device_channels.as_ref());
        let user_channels = MemoryChannelManager::new();
        users.register_channel_manager(user_channels.as_ref());

        let (user_channel, mut user_rx) = MemoryChannel::new("mem:user");
        user_channels.add(user_channel);

        let (device_channel, _device_rx) = MemoryChannel::new("mem:device");
        device_channels.add(Arc::clone(&device_channel));
        device_channel.push(&json!({"serial": "ABC", "props": {}}).to_string());
        device_channel.push(&json!({"serial": "ABC", "status": {"on": true}}).to_string());

        let frame = user_rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"serial": "ABC", "status": {"on": true}}));
    }

    #[tokio::test]
    async fn status_before_identity_broadcasts_nothing() {
        let devices = DeviceManager::new();
        let users = UserManager::new(Arc::new(MemoryAccessStore::new()));
        StatusRouter::new(Arc::clone(&users)).register(&devices, &users);

        let device_channels = MemoryChannelManager::new();
        devices.register_channel_manager(device_channels.as_ref());
        let user_channels = MemoryChannelManager::new();
        users.register_channel_manager(user_channels.as_ref());

        let (user_channel, mut user_rx) = MemoryChannel::new("mem:user");
        user_channels.add(user_channel);

        let (device_channel, _device_rx) = MemoryChannel::new("mem:device");
        device_channels.add(Arc::clone(&device_channel));
        device_channel.push(&json!({"serial": "ABC", "status": {"on": true}}).to_string());

        assert!(user_rx.try_recv().is_err());
    }
}
