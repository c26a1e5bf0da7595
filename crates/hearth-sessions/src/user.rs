//! A user session.

use std::sync::{Arc, Weak};

use hearth_channels::{Channel, MessageSink};
use hearth_core::protocol::{UserAccess, UserInbound, WirePayload};
use hearth_core::stores::AccessStore;
use parking_lot::Mutex;
use tracing::debug;

use crate::observers::{ObserverRegistry, UserObserver};

/// A connected user. Owns exactly one channel. The first inbound access
/// credential that validates against the access store becomes the session's
/// immutable `access`; until then the session is anonymous but may still
/// send and receive.
pub struct User {
    channel: Arc<dyn Channel>,
    access: Mutex<Option<UserAccess>>,
    access_store: Arc<dyn AccessStore>,
    observers: Arc<ObserverRegistry<dyn UserObserver>>,
    self_ref: Weak<User>,
}

impl User {
    /// Wrap a channel in a user session sharing its manager's observer
    /// registry and access store.
    pub fn new(
        channel: Arc<dyn Channel>,
        access_store: Arc<dyn AccessStore>,
        observers: Arc<ObserverRegistry<dyn UserObserver>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            channel,
            access: Mutex::new(None),
            access_store,
            observers,
            self_ref: self_ref.clone(),
        })
    }

    /// The channel this session owns.
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// The validated access, if authorization has succeeded.
    pub fn access(&self) -> Option<UserAccess> {
        self.access.lock().clone()
    }

    /// Whether this session carries a validated access.
    pub fn is_authorized(&self) -> bool {
        self.access.lock().is_some()
    }

    /// Write a payload to this user.
    pub fn write(&self, payload: &WirePayload) {
        self.channel.write(payload);
    }

    fn handle_access(&self, access: UserAccess) {
        let mut slot = self.access.lock();
        if slot.is_some() {
            // Access is immutable once granted.
            return;
        }
        if self
            .access_store
            .validate(&access.user_identifier, &access.identifier)
        {
            debug!(user = access.user_identifier, "user authorized");
            *slot = Some(access);
        } else {
            // Stays anonymous; no error surfaces to the transport.
            debug!(user = access.user_identifier, "user authorization failed");
        }
    }

    fn notify(&self, mut f: impl FnMut(&Arc<dyn UserObserver>, &Arc<User>)) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        self.observers.notify(|observer| f(observer, &this));
    }
}

impl MessageSink for User {
    fn on_message(&self, raw: &str) {
        match UserInbound::decode(raw) {
            Some(UserInbound::Access(access)) => self.handle_access(access),
            Some(UserInbound::Update(update)) => {
                self.notify(|observer, user| observer.update_requested(user, &update));
            }
            Some(UserInbound::Config(config)) => {
                self.notify(|observer, user| observer.config_submitted(user, &config));
            }
            Some(UserInbound::Translation(translation)) => {
                self.notify(|observer, user| observer.translation_submitted(user, &translation));
            }
            Some(UserInbound::DataRequest(request)) => {
                self.notify(|observer, user| observer.data_requested(user, &request));
            }
            None => debug!(peer = self.channel.identity(), "undecodable user frame dropped"),
        }
    }
}
