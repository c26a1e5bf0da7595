//! The mesh transport: a TCP server enforcing a single-root-node topology.
//!
//! One upstream connection (the root node) carries traffic for every node
//! in the mesh, multiplexed by MAC address through the
//! [`MeshEnvelope`](hearth_core::protocol::MeshEnvelope). The server owns
//! root election and the no-root message queue; the manager owns the
//! per-MAC channel map and intercepts transport-level `connection_event`
//! payloads.

mod channel;
mod manager;
mod server;

pub use channel::MeshChannel;
pub use manager::MeshChannelManager;
pub use server::{MeshServer, MeshServerEvents};
