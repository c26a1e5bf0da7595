//! Per-MAC mesh channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hearth_core::protocol::WirePayload;
use tracing::{debug, warn};

use crate::channel::{Channel, MessageSink, Slot};

use super::server::MeshServer;

/// Channel for one mesh node, identified by its MAC address. Writes are
/// re-wrapped in the mesh envelope tagged with the node's layer.
pub struct MeshChannel {
    mac: String,
    layer: u32,
    server: Arc<MeshServer>,
    sink: Slot<dyn MessageSink>,
    closed: AtomicBool,
}

impl MeshChannel {
    pub(crate) fn new(mac: impl Into<String>, layer: u32, server: Arc<MeshServer>) -> Self {
        Self {
            mac: mac.into(),
            layer,
            server,
            sink: Slot::empty(),
            closed: AtomicBool::new(false),
        }
    }

    /// Mesh layer this node reported at connect time.
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Hand one pre-filtered text frame to the attached session.
    pub(crate) fn deliver(&self, raw: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            sink.on_message(raw);
        }
    }
}

impl Channel for MeshChannel {
    fn identity(&self) -> &str {
        &self.mac
    }

    fn attach(&self, sink: Arc<dyn MessageSink>) {
        self.sink.set(sink);
    }

    fn write(&self, payload: &WirePayload) {
        if self.closed.load(Ordering::Acquire) {
            warn!(mac = %self.mac, "write on closed mesh channel ignored");
            return;
        }
        match payload.to_mesh_data() {
            Some(data) => self.server.write(&self.mac, self.layer, data),
            None => warn!(mac = %self.mac, "payload has no mesh representation, dropped"),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sink.clear();
            debug!(mac = %self.mac, "mesh channel closed");
        }
    }
}
