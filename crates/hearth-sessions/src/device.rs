//! A device session.

use std::sync::{Arc, Weak};

use hearth_channels::{Channel, MessageSink};
use hearth_core::protocol::{
    DeviceIdentity, DeviceInbound, DeviceRequest, DeviceStatus, IntegrityEvent, WirePayload,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::observers::{DeviceObserver, ObserverRegistry};

/// A connected device. Owns exactly one channel for the life of the
/// session and reveals two sequential facts about itself: identity
/// (set once, immutable) and status (overwritten on each update, never
/// before identity).
pub struct Device {
    channel: Arc<dyn Channel>,
    identity: Mutex<Option<DeviceIdentity>>,
    status: Mutex<Option<DeviceStatus>>,
    observers: Arc<ObserverRegistry<dyn DeviceObserver>>,
    self_ref: Weak<Device>,
}

impl Device {
    /// Wrap a channel in a device session sharing its manager's observer
    /// registry.
    pub fn new(
        channel: Arc<dyn Channel>,
        observers: Arc<ObserverRegistry<dyn DeviceObserver>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            channel,
            identity: Mutex::new(None),
            status: Mutex::new(None),
            observers,
            self_ref: self_ref.clone(),
        })
    }

    /// The channel this session owns.
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Identity, if the device has announced one.
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.lock().clone()
    }

    /// Last announced status, if any.
    pub fn status(&self) -> Option<DeviceStatus> {
        self.status.lock().clone()
    }

    /// Serial number, once identified.
    pub fn serial(&self) -> Option<String> {
        self.identity.lock().as_ref().map(|i| i.serial.clone())
    }

    /// Whether both identity and status have been announced.
    pub fn is_ready(&self) -> bool {
        self.identity.lock().is_some() && self.status.lock().is_some()
    }

    /// Re-drive whatever announcement step is missing: request identity if
    /// absent, else status if absent, else nothing.
    pub fn check_integrity(&self) {
        let serial = {
            let identity = self.identity.lock();
            match identity.as_ref() {
                None => {
                    debug!(peer = self.channel.identity(), "requesting identity");
                    self.channel
                        .write(&WirePayload::Request(DeviceRequest::identity()));
                    return;
                }
                Some(identity) => identity.serial.clone(),
            }
        };
        if self.status.lock().is_none() {
            debug!(serial, "requesting status");
            self.channel
                .write(&WirePayload::Request(DeviceRequest::status(serial)));
        }
    }

    fn set_identity(&self, identity: DeviceIdentity) {
        {
            let mut slot = self.identity.lock();
            if slot.is_some() {
                // Identity is immutable after the first announcement; a
                // repeat is dropped, not merged.
                debug!(serial = identity.serial, "repeat identity dropped");
                return;
            }
            *slot = Some(identity.clone());
        }
        debug!(serial = identity.serial, "device identified");
        self.notify(|observer, device| observer.identity_established(device, &identity));

        // A freshly identified device is immediately asked for its status.
        self.channel
            .write(&WirePayload::Request(DeviceRequest::status(&identity.serial)));
    }

    fn set_status(&self, status: DeviceStatus) {
        if self.identity.lock().is_none() {
            warn!(serial = status.serial, "status before identity dropped");
            return;
        }
        *self.status.lock() = Some(status.clone());
        debug!(serial = status.serial, "device status updated");
        self.notify(|observer, device| observer.status_updated(device, &status));
    }

    fn notify(&self, mut f: impl FnMut(&Arc<dyn DeviceObserver>, &Arc<Device>)) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        self.observers.notify(|observer| f(observer, &this));
    }
}

impl MessageSink for Device {
    fn on_message(&self, raw: &str) {
        match DeviceInbound::decode(raw) {
            Some(DeviceInbound::Identity(identity)) => self.set_identity(identity),
            Some(DeviceInbound::Status(status)) => self.set_status(status),
            Some(DeviceInbound::Event(event)) => {
                self.notify(|observer, device| observer.event_raised(device, &event));
            }
            Some(DeviceInbound::Integrity(probe)) => match probe.integrity {
                IntegrityEvent::Check => self.check_integrity(),
            },
            // Not a device message; steady-state noise, not an error.
            None => debug!(peer = self.channel.identity(), "undecodable device frame dropped"),
        }
    }
}
