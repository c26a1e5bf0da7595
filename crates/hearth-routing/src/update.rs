//! Update routing: forward user-originated device updates by serial.

use std::sync::Arc;

use hearth_core::protocol::{DeviceUpdate, WirePayload};
use hearth_sessions::{DeviceManager, User, UserManager, UserObserver};

use crate::Router;

/// Forwards device property updates from users to the addressed device.
pub struct UpdateRouter {
    devices: Arc<DeviceManager>,
}

impl UpdateRouter {
    /// Router name.
    pub const NAME: &'static str = "update";

    /// Build the router.
    pub fn new(devices: Arc<DeviceManager>) -> Arc<Self> {
        Arc::new(Self { devices })
    }
}

impl Router for UpdateRouter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self: Arc<Self>, _devices: &DeviceManager, users: &UserManager) {
        users.register_observer(self);
    }
}

impl UserObserver for UpdateRouter {
    fn update_requested(&self, _user: &Arc<User>, update: &DeviceUpdate) {
        self.devices
            .send(&update.serial, &WirePayload::Update(update.clone()));
    }
}
