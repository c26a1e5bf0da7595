//! # hearth-channels
//!
//! The transport layer of the hearth gateway. Every peer — a mesh node, a
//! raw TCP device, a WebSocket user, an in-process simulated device — is
//! normalized into a [`Channel`]: a bidirectional endpoint that delivers
//! decoded text frames to its attached session and accepts fire-and-forget
//! writes of typed payloads.
//!
//! One channel manager per transport owns the listener, the per-identity
//! channel map, and the transport's duplicate-connection policy.

#![deny(unsafe_code)]

pub mod channel;
pub mod memory;
pub mod mesh;
pub mod tcp;
pub mod ws;

pub use channel::{Channel, ChannelEvents, ChannelManager, MessageSink};
pub use memory::{MemoryChannel, MemoryChannelManager, SimulatedDevice};
pub use mesh::{MeshChannel, MeshChannelManager, MeshServer};
pub use tcp::TcpChannelManager;
pub use ws::WsChannelManager;
