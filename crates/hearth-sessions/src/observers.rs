//! Observer registries wiring routers into session events.
//!
//! "Firing an event" is a synchronous iteration over the registered
//! observers, in registration order, under the same lock that serializes
//! registration.

use std::sync::Arc;

use hearth_core::protocol::{
    DeviceConfiguration, DeviceEvent, DeviceIdentity, DeviceStatus, DeviceTranslation,
    DeviceUpdate, UserDataRequest,
};
use parking_lot::RwLock;

use crate::device::Device;
use crate::user::User;

/// Typed device-session events a router can subscribe to. Every method has
/// an empty default so routers implement only what they route.
pub trait DeviceObserver: Send + Sync {
    /// A device session opened (no identity yet).
    fn device_connected(&self, _device: &Arc<Device>) {}

    /// A device session closed.
    fn device_disconnected(&self, _device: &Arc<Device>) {}

    /// The device announced its identity. Fires at most once per session.
    fn identity_established(&self, _device: &Arc<Device>, _identity: &DeviceIdentity) {}

    /// The device announced a status. Fires on every update.
    fn status_updated(&self, _device: &Arc<Device>, _status: &DeviceStatus) {}

    /// The device raised an event.
    fn event_raised(&self, _device: &Arc<Device>, _event: &DeviceEvent) {}
}

/// Typed user-session events a router can subscribe to.
pub trait UserObserver: Send + Sync {
    /// A user session opened.
    fn user_connected(&self, _user: &Arc<User>) {}

    /// A user session closed.
    fn user_disconnected(&self, _user: &Arc<User>) {}

    /// The user asked for a device property update.
    fn update_requested(&self, _user: &Arc<User>, _update: &DeviceUpdate) {}

    /// The user submitted a device configuration.
    fn config_submitted(&self, _user: &Arc<User>, _config: &DeviceConfiguration) {}

    /// The user submitted a device translation.
    fn translation_submitted(&self, _user: &Arc<User>, _translation: &DeviceTranslation) {}

    /// The user issued a generic data request.
    fn data_requested(&self, _user: &Arc<User>, _request: &UserDataRequest) {}
}

/// Ordered set of interface-typed listeners.
pub struct ObserverRegistry<T: ?Sized> {
    observers: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> ObserverRegistry<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Append an observer. Registration order is notification order.
    pub fn register(&self, observer: Arc<T>) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Invoke `f` for each observer, synchronously, in order.
    pub fn notify(&self, mut f: impl FnMut(&Arc<T>)) {
        let observers = self.observers.read();
        for observer in observers.iter() {
            f(observer);
        }
    }
}

impl<T: ?Sized> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Probe: Send + Sync {
        fn tag(&self) -> &str;
    }

    struct Tagged(&'static str);

    impl Probe for Tagged {
        fn tag(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn starts_empty() {
        let registry: ObserverRegistry<dyn Probe> = ObserverRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn notify_preserves_registration_order() {
        let registry: ObserverRegistry<dyn Probe> = ObserverRegistry::new();
        registry.register(Arc::new(Tagged("a")));
        registry.register(Arc::new(Tagged("b")));
        registry.register(Arc::new(Tagged("c")));

        let seen = Mutex::new(Vec::new());
        registry.notify(|observer| seen.lock().push(observer.tag().to_owned()));
        assert_eq!(seen.lock().as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn notify_on_empty_registry_is_noop() {
        let registry: ObserverRegistry<dyn Probe> = ObserverRegistry::new();
        registry.notify(|_| panic!("no observers registered"));
    }
}
