//! Request routing: introspection queries answered with synthesized
//! replies.

use std::sync::Arc;

use hearth_core::protocol::{PingResponse, UserDataRequest, WirePayload};
use hearth_sessions::{DeviceManager, User, UserManager, UserObserver};
use tracing::debug;

use crate::data_service::DevicesDataService;
use crate::Router;

/// Answers user data requests: `getDevices` with the aggregated device
/// list, `ping` with the server identity.
pub struct RequestRouter {
    data: DevicesDataService,
    server_identifier: Option<String>,
}

impl RequestRouter {
    /// Router name.
    pub const NAME: &'static str = "request";

    /// Build the router.
    pub fn new(data: DevicesDataService, server_identifier: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            data,
            server_identifier,
        })
    }
}

impl Router for RequestRouter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self: Arc<Self>, _devices: &DeviceManager, users: &UserManager) {
        users.register_observer(self);
    }
}

impl UserObserver for RequestRouter {
    fn data_requested(&self, user: &Arc<User>, request: &UserDataRequest) {
        match request.data_request.as_str() {
            UserDataRequest::GET_DEVICES => {
                user.write(&WirePayload::DeviceList(self.data.snapshot()));
            }
            UserDataRequest::PING => {
                user.write(&WirePayload::Ping(PingResponse::new(
                    self.server_identifier.clone(),
                )));
            }
            other => debug!(request = other, "unknown data request ignored"),
        }
    }
}
