//! Owner of the live user session set.

use std::sync::Arc;

use hearth_channels::{Channel, ChannelEvents, ChannelManager};
use hearth_core::protocol::WirePayload;
use hearth_core::stores::AccessStore;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::observers::{ObserverRegistry, UserObserver};
use crate::user::User;

fn same_channel(a: &Arc<dyn Channel>, b: &Arc<dyn Channel>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<u8>(), Arc::as_ptr(b).cast::<u8>())
}

/// Owns every live user session and the channel managers feeding it.
pub struct UserManager {
    users: Mutex<Vec<Arc<User>>>,
    manager_kinds: Mutex<Vec<&'static str>>,
    observers: Arc<ObserverRegistry<dyn UserObserver>>,
    access_store: Arc<dyn AccessStore>,
}

impl UserManager {
    /// Empty manager validating credentials against the given store.
    pub fn new(access_store: Arc<dyn AccessStore>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(Vec::new()),
            manager_kinds: Mutex::new(Vec::new()),
            observers: Arc::new(ObserverRegistry::new()),
            access_store,
        })
    }

    /// Register a router (or any observer) for user session events.
    pub fn register_observer(&self, observer: Arc<dyn UserObserver>) {
        self.observers.register(observer);
    }

    /// Wire a channel manager into this session manager. Idempotent per
    /// transport kind: a repeat registration is a warned no-op.
    pub fn register_channel_manager(self: &Arc<Self>, manager: &dyn ChannelManager) {
        {
            let mut kinds = self.manager_kinds.lock();
            if kinds.contains(&manager.kind()) {
                warn!(kind = manager.kind(), "channel manager kind already registered, ignoring");
                return;
            }
            kinds.push(manager.kind());
        }
        manager.bind(Arc::clone(self) as Arc<dyn ChannelEvents>);
        info!(kind = manager.kind(), "channel manager registered for users");
    }

    /// Whether a channel manager of this kind is registered.
    pub fn has_channel_manager(&self, kind: &str) -> bool {
        self.manager_kinds.lock().contains(&kind)
    }

    /// Snapshot of the current sessions.
    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.lock().clone()
    }

    /// Number of live sessions.
    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    /// Write a payload to every connected user, authorized or not.
    /// Filtering, where needed, is a router's responsibility. The session
    /// lock is released before any write.
    pub fn broadcast(&self, payload: &WirePayload) {
        let snapshot = self.users();
        for user in snapshot {
            user.write(payload);
        }
    }
}

impl ChannelEvents for UserManager {
    fn channel_connected(&self, channel: Arc<dyn Channel>) {
        let user = User::new(
            Arc::clone(&channel),
            Arc::clone(&self.access_store),
            Arc::clone(&self.observers),
        );
        channel.attach(user.clone());
        self.users.lock().push(Arc::clone(&user));

        info!(peer = channel.identity(), "user session connected");
        self.observers.notify(|observer| observer.user_connected(&user));
    }

    fn channel_disconnected(&self, channel: Arc<dyn Channel>) {
        let removed: Vec<Arc<User>> = {
            let mut users = self.users.lock();
            let (gone, kept) = users
                .drain(..)
                .partition(|user| same_channel(user.channel(), &channel));
            *users = kept;
            gone
        };
        for user in removed {
            info!(peer = channel.identity(), "user session disconnected");
            self.observers
                .notify(|observer| observer.user_disconnected(&user));
        }
    }
}
