//! Owner of the live device session set.

use std::sync::Arc;

use hearth_channels::{Channel, ChannelEvents, ChannelManager};
use hearth_core::protocol::WirePayload;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::observers::{DeviceObserver, ObserverRegistry};

fn same_channel(a: &Arc<dyn Channel>, b: &Arc<dyn Channel>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<u8>(), Arc::as_ptr(b).cast::<u8>())
}

/// Owns every live device session and the channel managers feeding it.
/// Constructed once at startup and injected wherever device lookup is
/// needed.
pub struct DeviceManager {
    devices: Mutex<Vec<Arc<Device>>>,
    manager_kinds: Mutex<Vec<&'static str>>,
    observers: Arc<ObserverRegistry<dyn DeviceObserver>>,
}

impl DeviceManager {
    /// Empty manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: Mutex::new(Vec::new()),
            manager_kinds: Mutex::new(Vec::new()),
            observers: Arc::new(ObserverRegistry::new()),
        })
    }

    /// Register a router (or any observer) for device session events.
    pub fn register_observer(&self, observer: Arc<dyn DeviceObserver>) {
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
        info!(kind = manager.kind(), "channel manager registered for devices");
    }

    /// Whether a channel manager of this kind is registered.
    pub fn has_channel_manager(&self, kind: &str) -> bool {
        self.manager_kinds.lock().contains(&kind)
    }

    /// Snapshot of the current sessions.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.lock().clone()
    }

    /// Number of live sessions.
    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// The identity-bearing session with this serial number, if connected.
    pub fn get(&self, serial: &str) -> Option<Arc<Device>> {
        self.devices
            .lock()
            .iter()
            .find(|device| device.serial().as_deref() == Some(serial))
            .cloned()
    }

    /// Write a payload to the device with this serial number. A miss is a
    /// logged no-op, never an error.
    pub fn send(&self, serial: &str, payload: &WirePayload) {
        match self.get(serial) {
            Some(device) => {
                debug!(serial, "sending payload to device");
                device.channel().write(payload);
            }
            None => debug!(serial, "no identified device with this serial, payload dropped"),
        }
    }
}

impl ChannelEvents for DeviceManager {
    fn channel_connected(&self, channel: Arc<dyn Channel>) {
        let device = Device::new(Arc::clone(&channel), Arc::clone(&self.observers));
        channel.attach(device.clone());
        self.devices.lock().push(Arc::clone(&device));

        info!(peer = channel.identity(), "device session connected");
        self.observers.notify(|observer| observer.device_connected(&device));
        // Ask the new session to identify itself.
        device.check_integrity();
    }

    fn channel_disconnected(&self, channel: Arc<dyn Channel>) {
        // 1:1 channel ownership should make this at most one session, but
        // stay tolerant of multiple matches.
        let removed: Vec<Arc<Device>> = {
            let mut devices = self.devices.lock();
            let (gone, kept) = devices
                .drain(..)
                .partition(|device| same_channel(device.channel(), &channel));
            *devices = kept;
            gone
        };
        for device in removed {
            info!(peer = channel.identity(), serial = ?device.serial(), "device session disconnected");
            self.observers
                .notify(|observer| observer.device_disconnected(&device));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_channels::{MemoryChannel, MemoryChannelManager};
    use hearth_core::protocol::DeviceRequest;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        connected: SyncMutex<usize>,
        disconnected: SyncMutex<usize>,
    }

    impl DeviceObserver for Recorder {
        fn device_connected(&self, _device: &Arc<Device>) {
            *self.connected.lock() += 1;
        }

        fn device_disconnected(&self, _device: &Arc<Device>) {
            *self.disconnected.lock() += 1;
        }
    }

    fn wired() -> (
        Arc<DeviceManager>,
        Arc<MemoryChannelManager>,
        Arc<Recorder>,
    ) {
        let devices = DeviceManager::new();
        let recorder = Arc::new(Recorder::default());
        devices.register_observer(recorder.clone() as Arc<dyn DeviceObserver>);

        let channels = MemoryChannelManager::new();
        devices.register_channel_manager(channels.as_ref());
        (devices, channels, recorder)
    }

    fn identify(channel: &Arc<MemoryChannel>, serial: &str) {
        channel.push(&json!({"serial": serial, "props": {}}).to_string());
    }

    #[test]
    fn duplicate_manager_kind_is_ignored() {
        let (devices, _channels, _recorder) = wired();
        let second = MemoryChannelManager::new();
        devices.register_channel_manager(second.as_ref());
        assert!(devices.has_channel_manager("memory"));
        // The second memory manager got no listener: adding a channel to it
        // creates no session.
        let (channel, _rx) = MemoryChannel::new("mem:dup");
        second.add(channel);
        assert_eq!(devices.device_count(), 0);
    }

    #[tokio::test]
    async fn channel_connect_creates_session_and_requests_identity() {
        let (devices, channels, recorder) = wired();
        let (channel, mut rx) = MemoryChannel::new("mem:a");
        channels.add(channel);

        assert_eq!(devices.device_count(), 1);
        assert_eq!(*recorder.connected.lock(), 1);

        // The fresh session was probed for its identity.
        let written = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["request"], "identity");
    }

    #[test]
    fn channel_disconnect_removes_session() {
        let (devices, channels, recorder) = wired();
        let (channel, _rx) = MemoryChannel::new("mem:a");
        channels.add(Arc::clone(&channel));
        channels.remove(&channel);

        assert_eq!(devices.device_count(), 0);
        assert_eq!(*recorder.disconnected.lock(), 1);
    }

    #[test]
    fn disconnect_leaves_other_sessions_alone() {
        let (devices, channels, _recorder) = wired();
        let (a, _rx_a) = MemoryChannel::new("mem:a");
        let (b, _rx_b) = MemoryChannel::new("mem:b");
        channels.add(Arc::clone(&a));
        channels.add(Arc::clone(&b));

        channels.remove(&a);
        assert_eq!(devices.device_count(), 1);
    }

    #[test]
    fn get_finds_identified_devices_only() {
        let (devices, channels, _recorder) = wired();
        let (channel, _rx) = MemoryChannel::new("mem:a");
        channels.add(Arc::clone(&channel));

        assert!(devices.get("ABC").is_none());
        identify(&channel, "ABC");
        assert!(devices.get("ABC").is_some());
        assert!(devices.get("XYZ").is_none());
    }

    #[tokio::test]
    async fn send_reaches_identified_device() {
        let (devices, channels, _recorder) = wired();
        let (channel, mut rx) = MemoryChannel::new("mem:a");
        channels.add(Arc::clone(&channel));
        let _identity_request = rx.recv().await.unwrap();

        identify(&channel, "ABC");
        let _status_request = rx.recv().await.unwrap();

        devices.send("ABC", &WirePayload::Request(DeviceRequest::status("ABC")));
        let written = rx.recv().await.unwrap();
        assert!(written.contains("status"));
    }

    #[test]
    fn send_to_unknown_serial_is_noop() {
        let (devices, _channels, _recorder) = wired();
        devices.send("NOPE", &WirePayload::Request(DeviceRequest::status("NOPE")));
        assert_eq!(devices.device_count(), 0);
    }

    #[test]
    fn snapshot_is_detached_from_live_set() {
        let (devices, channels, _recorder) = wired();
        let (channel, _rx) = MemoryChannel::new("mem:a");
        channels.add(Arc::clone(&channel));

        let snapshot = devices.devices();
        channels.remove(&channel);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(devices.device_count(), 0);
    }
}
