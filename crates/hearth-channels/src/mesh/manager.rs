//! Mesh channel manager: per-MAC channel map and transport-level session
//! control.

use std::sync::Arc;

use dashmap::DashMap;
use hearth_core::config::MeshSection;
use hearth_core::errors::ChannelError;
use hearth_core::protocol::{ConnectionEvent, DeviceIntegrity, MeshData, MeshEnvelope};
use tracing::{debug, warn};

use crate::channel::{Channel, ChannelEvents, ChannelManager, Slot};

use super::channel::MeshChannel;
use super::server::{MeshServer, MeshServerEvents};

/// Manager for mesh-backed channels, one per MAC address.
pub struct MeshChannelManager {
    server: Arc<MeshServer>,
    channels: DashMap<String, Arc<MeshChannel>>,
    events: Slot<dyn ChannelEvents>,
}

impl MeshChannelManager {
    /// Transport kind used for registration deduplication.
    pub const KIND: &'static str = "mesh";

    /// Start the mesh TCP server and the manager wired to it.
    pub async fn start(config: &MeshSection) -> Result<Arc<Self>, ChannelError> {
        let server = MeshServer::start(config.listen_port, config.kill_on_connect).await?;
        Ok(Self::with_server(server))
    }

    /// Build a manager around an already running server. Used by tests that
    /// need the server's bound address.
    pub fn with_server(server: Arc<MeshServer>) -> Arc<Self> {
        let manager = Arc::new(Self {
            server: Arc::clone(&server),
            channels: DashMap::new(),
            events: Slot::empty(),
        });
        server.set_events(Arc::clone(&manager) as Arc<dyn MeshServerEvents>);
        manager
    }

    /// The underlying mesh server.
    pub fn server(&self) -> &Arc<MeshServer> {
        &self.server
    }

    /// Number of live mesh channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn create_channel(&self, mac: &str, layer: u32) {
        if let Some(existing) = self.channels.get(mac) {
            // The node re-announced a MAC we already track. Instead of a
            // duplicate channel, probe the existing session so it can
            // re-announce whatever state was lost.
            warn!(mac, "connect for registered MAC, probing existing channel");
            if let Ok(probe) = serde_json::to_string(&DeviceIntegrity::check()) {
                existing.deliver(&probe);
            }
            return;
        }

        let channel = Arc::new(MeshChannel::new(mac, layer, Arc::clone(&self.server)));
        let _ = self.channels.insert(mac.to_owned(), Arc::clone(&channel));
        debug!(mac, layer, "mesh channel created");
        if let Some(events) = self.events.get() {
            events.channel_connected(channel);
        }
    }

    fn delete_channel(&self, mac: &str) {
        match self.channels.remove(mac) {
            Some((_, channel)) => {
                debug!(mac, "mesh channel removed");
                if let Some(events) = self.events.get() {
                    events.channel_disconnected(Arc::clone(&channel) as Arc<dyn Channel>);
                }
                channel.close();
            }
            None => warn!(mac, "disconnect for unregistered MAC ignored"),
        }
    }
}

impl ChannelManager for MeshChannelManager {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn bind(&self, events: Arc<dyn ChannelEvents>) {
        self.events.set(events);
    }
}

impl MeshServerEvents for MeshChannelManager {
    fn message(&self, raw: &str) {
        let Ok(envelope) = serde_json::from_str::<MeshEnvelope>(raw) else {
            // Not a known envelope shape: steady-state noise, not an error.
            debug!(frame = raw, "unparseable mesh frame dropped");
            return;
        };

        match envelope.data {
            MeshData::Connection(ConnectionEvent::Connected) => {
                self.create_channel(&envelope.mac, envelope.layer);
            }
            MeshData::Connection(ConnectionEvent::Disconnected) => {
                self.delete_channel(&envelope.mac);
            }
            data => match self.channels.get(&envelope.mac) {
                Some(channel) => {
                    if let Some(text) = data.to_wire_text() {
                        channel.deliver(&text);
                    }
                }
                None => debug!(mac = %envelope.mac, "frame for unregistered MAC dropped"),
            },
        }
    }

    fn mesh_killed(&self) {
        let macs: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        let events = self.events.get();
        for mac in macs {
            if let Some((_, channel)) = self.channels.remove(&mac) {
                if let Some(events) = events.as_ref() {
                    events.channel_disconnected(Arc::clone(&channel) as Arc<dyn Channel>);
                }
                channel.close();
            }
        }
        debug!("mesh channels purged");
    }
}
