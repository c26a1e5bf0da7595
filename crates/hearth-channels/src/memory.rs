//! Loop-back in-process transport.
//!
//! A [`MemoryChannel`] pairs the gateway-side [`Channel`] with a
//! client-side handle: `push` injects inbound frames, and the outbound
//! receiver returned at construction carries everything the gateway
//! writes. [`SimulatedDevice`] sits on the client side and answers the
//! device wire protocol, so a server can host devices that exist only in
//! memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hearth_core::protocol::{
    DeviceEvent, DeviceIdentity, DeviceRequest, DeviceStatus, DeviceUpdate, RequestKind,
    WirePayload,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelEvents, ChannelManager, MessageSink, Slot};

/// In-process channel endpoint.
pub struct MemoryChannel {
    identity: String,
    outbound: mpsc::UnboundedSender<String>,
    sink: Slot<dyn MessageSink>,
    closed: AtomicBool,
}

impl MemoryChannel {
    /// Create a channel and the receiver carrying its outbound frames.
    pub fn new(identity: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                identity: identity.into(),
                outbound: tx,
                sink: Slot::empty(),
                closed: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// Inject one inbound frame, as if the peer had sent it.
    pub fn push(&self, raw: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            sink.on_message(raw);
        }
    }
}

impl Channel for MemoryChannel {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn attach(&self, sink: Arc<dyn MessageSink>) {
        self.sink.set(sink);
    }

    fn write(&self, payload: &WirePayload) {
        if self.closed.load(Ordering::Acquire) {
            warn!(endpoint = %self.identity, "write on closed memory channel ignored");
            return;
        }
        let Some(text) = payload.encode() else {
            return;
        };
        // Peer gone: fire-and-forget semantics, same as a dead socket.
        let _ = self.outbound.send(text);
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sink.clear();
            debug!(endpoint = %self.identity, "memory channel closed");
        }
    }
}

/// Manager for loop-back channels. Channels are added and removed
/// programmatically; there is no listener to own.
pub struct MemoryChannelManager {
    channels: Mutex<Vec<Arc<MemoryChannel>>>,
    events: Slot<dyn ChannelEvents>,
}

impl MemoryChannelManager {
    /// Transport kind used for registration deduplication.
    pub const KIND: &'static str = "memory";

    /// Empty manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(Vec::new()),
            events: Slot::empty(),
        })
    }

    /// Number of live loop-back channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Connect an endpoint. Re-adding a connected endpoint is ignored.
    pub fn add(&self, channel: Arc<MemoryChannel>) {
        {
            let mut channels = self.channels.lock();
            if channels.iter().any(|c| Arc::ptr_eq(c, &channel)) {
                return;
            }
            channels.push(Arc::clone(&channel));
        }
        info!(endpoint = %channel.identity, "memory channel added");
        if let Some(events) = self.events.get() {
            events.channel_connected(channel as Arc<dyn Channel>);
        }
    }

    /// Disconnect an endpoint. Removing an unknown endpoint is ignored.
    pub fn remove(&self, channel: &Arc<MemoryChannel>) {
        let removed = {
            let mut channels = self.channels.lock();
            let before = channels.len();
            channels.retain(|c| !Arc::ptr_eq(c, channel));
            channels.len() != before
        };
        if !removed {
            return;
        }
        info!(endpoint = %channel.identity, "memory channel removed");
        if let Some(events) = self.events.get() {
            events.channel_disconnected(Arc::clone(channel) as Arc<dyn Channel>);
        }
        channel.close();
    }
}

impl ChannelManager for MemoryChannelManager {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn bind(&self, events: Arc<dyn ChannelEvents>) {
        self.events.set(events);
    }
}

/// An in-memory peer that behaves like an IoT device: announces identity
/// and status on request and applies property updates.
pub struct SimulatedDevice {
    identity: DeviceIdentity,
    status: Mutex<Map<String, Value>>,
    channel: Arc<MemoryChannel>,
}

impl SimulatedDevice {
    /// Connect a simulated device to the manager and start answering the
    /// device wire protocol.
    pub fn spawn(
        manager: &Arc<MemoryChannelManager>,
        identity: DeviceIdentity,
        initial_status: Map<String, Value>,
    ) -> Arc<Self> {
        let endpoint = format!("mem:{}", identity.serial);
        let (channel, mut outbound) = MemoryChannel::new(endpoint);
        let device = Arc::new(Self {
            identity,
            status: Mutex::new(initial_status),
            channel: Arc::clone(&channel),
        });

        manager.add(channel);

        let handler = Arc::clone(&device);
        drop(tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                handler.handle(&frame);
            }
        }));
        device
    }

    /// The gateway-side channel of this device.
    pub fn channel(&self) -> &Arc<MemoryChannel> {
        &self.channel
    }

    /// Announce the device's identity.
    pub fn announce_identity(&self) {
        if let Ok(text) = serde_json::to_string(&self.identity) {
            self.channel.push(&text);
        }
    }

    /// Announce the device's current status.
    pub fn announce_status(&self) {
        let status = DeviceStatus {
            serial: self.identity.serial.clone(),
            status: self.status.lock().clone(),
        };
        if let Ok(text) = serde_json::to_string(&status) {
            self.channel.push(&text);
        }
    }

    /// Raise an event from this device.
    pub fn emit_event(&self, name: &str, arguments: Map<String, Value>, target: Option<String>) {
        let event = DeviceEvent {
            serial: self.identity.serial.clone(),
            name: name.to_owned(),
            arguments,
            target,
        };
        if let Ok(text) = serde_json::to_string(&event) {
            self.channel.push(&text);
        }
    }

    fn handle(&self, raw: &str) {
        if let Ok(request) = serde_json::from_str::<DeviceRequest>(raw) {
            match request.request {
                RequestKind::Identity => self.announce_identity(),
                RequestKind::Status => self.announce_status(),
            }
            return;
        }
        if let Ok(update) = serde_json::from_str::<DeviceUpdate>(raw) {
            {
                let mut status = self.status.lock();
                for (key, value) in update.update {
                    let _ = status.insert(key, value);
                }
            }
            self.announce_status();
        }
        // Config pushes and forwarded events need no reply.
    }
}
