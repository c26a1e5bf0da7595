//! Mesh TCP server: root-node election and message queueing.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use hearth_core::errors::ChannelError;
use hearth_core::protocol::{MeshData, MeshEnvelope};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::Slot;

/// Upper bound for one newline-delimited frame.
const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Outbound frames buffered per root connection before writes are dropped.
const OUTBOUND_QUEUE: usize = 256;

/// Listener for mesh server notifications. Implemented by the mesh channel
/// manager.
pub trait MeshServerEvents: Send + Sync {
    /// One raw frame received through the root, delivered in arrival order.
    fn message(&self, raw: &str);

    /// The root node disconnected; the whole mesh is gone.
    fn mesh_killed(&self);
}

struct RootNode {
    addr: SocketAddr,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

/// Root identity and the pending-frame queue. Guarded together: a drain
/// must never pop frames against a root decision that is already stale.
struct RootState {
    root: Option<RootNode>,
    queue: VecDeque<String>,
}

/// TCP server for the mesh network. At most one connection — the root
/// node — is authoritative at any time.
pub struct MeshServer {
    kill_on_connect: bool,
    local_addr: SocketAddr,
    state: Mutex<RootState>,
    /// Serializes queue dispatch so frames cannot interleave or reorder
    /// when connect and read tasks drain concurrently. Never held while
    /// the state lock is held across a dispatch.
    drain_lock: Mutex<()>,
    events: Slot<dyn MeshServerEvents>,
}

impl MeshServer {
    /// Bind the mesh listener and start accepting root connections.
    ///
    /// Bind failure is the one fatal error of this transport.
    pub async fn start(port: u16, kill_on_connect: bool) -> Result<Arc<Self>, ChannelError> {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ChannelError::bind("mesh", addr.clone(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ChannelError::bind("mesh", addr, e))?;

        let server = Arc::new(Self {
            kill_on_connect,
            local_addr,
            state: Mutex::new(RootState {
                root: None,
                queue: VecDeque::new(),
            }),
            drain_lock: Mutex::new(()),
            events: Slot::empty(),
        });

        info!(%local_addr, kill_on_connect, "mesh server listening");
        drop(tokio::spawn(Arc::clone(&server).accept_loop(listener)));
        Ok(server)
    }

    /// Register the single listener for server notifications.
    pub fn set_events(&self, events: Arc<dyn MeshServerEvents>) {
        self.events.set(events);
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a root node is currently connected.
    pub fn has_root(&self) -> bool {
        self.state.lock().root.is_some()
    }

    /// Number of frames waiting for a root.
    pub fn queued_frames(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Wrap a payload in the mesh envelope and send it through the root.
    /// Dropped silently when no root is connected; outbound is best-effort.
    pub fn write(&self, mac: &str, layer: u32, data: MeshData) {
        let envelope = MeshEnvelope::new(mac, layer, data);
        let Ok(json) = serde_json::to_string(&envelope) else {
            return;
        };
        let tx = self.state.lock().root.as_ref().map(|root| root.tx.clone());
        let Some(tx) = tx else {
            debug!(mac, "dropping outbound mesh frame, no root connected");
            return;
        };
        if tx.try_send(json).is_err() {
            warn!(mac, "mesh outbound queue unavailable, frame dropped");
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => self.clone().handle_accept(stream, addr),
                Err(e) => warn!(error = %e, "mesh accept failed"),
            }
        }
    }

    fn handle_accept(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let cancel = CancellationToken::new();
        let node = RootNode {
            addr,
            tx,
            cancel: cancel.clone(),
        };

        let accepted = {
            let mut state = self.state.lock();
            match state.root.as_ref() {
                None => {
                    info!(%addr, "root node connected");
                    state.root = Some(node);
                    true
                }
                Some(root) if self.kill_on_connect => {
                    warn!(old = %root.addr, new = %addr, "new root connection, dropping current root");
                    root.cancel.cancel();
                    state.root = Some(node);
                    true
                }
                Some(root) if root.tx.is_closed() => {
                    info!(old = %root.addr, new = %addr, "current root is dead, promoting new connection");
                    state.root = Some(node);
                    true
                }
                Some(root) => {
                    warn!(current = %root.addr, rejected = %addr, "root already connected, rejecting new connection");
                    false
                }
            }
        };

        if !accepted {
            drop(stream);
            return;
        }

        drop(tokio::spawn(self.clone().run_root(stream, addr, rx, cancel)));
        // A reconnecting root picks up whatever was buffered while no root
        // was present.
        self.drain();
    }

    async fn run_root(
        self: Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        mut rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                outbound = rx.recv() => match outbound {
                    Some(line) => {
                        if framed.send(line).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                inbound = framed.next() => match inbound {
                    Some(Ok(line)) => self.enqueue(line),
                    Some(Err(e)) => {
                        warn!(%addr, error = %e, "mesh frame error, dropping connection");
                        break;
                    }
                    None => break,
                },
            }
        }
        // Close the outbound queue before the disconnect transition so a
        // racing accept sees this root as dead.
        rx.close();
        drop(rx);
        self.handle_disconnect(addr);
    }

    /// Buffer a frame, then dispatch everything pending if a root is
    /// present. Frames are never dropped while no root is connected; a
    /// root may disconnect and reconnect within the same burst.
    pub(crate) fn enqueue(&self, line: String) {
        self.state.lock().queue.push_back(line);
        self.drain();
    }

    fn drain(&self) {
        let Some(events) = self.events.get() else {
            return;
        };
        let _guard = self.drain_lock.lock();
        loop {
            let frame = {
                let mut state = self.state.lock();
                if state.root.is_none() {
                    return;
                }
                state.queue.pop_front()
            };
            let Some(frame) = frame else { return };
            debug!(frame = %frame, "dispatching mesh frame");
            events.message(&frame);
        }
    }

    fn handle_disconnect(&self, addr: SocketAddr) {
        let killed = {
            let mut state = self.state.lock();
            match state.root.as_ref() {
                Some(root) if root.addr == addr => {
                    state.root = None;
                    state.queue.clear();
                    true
                }
                // A forcibly replaced root disconnects after its
                // replacement took over; that is not a mesh kill.
                _ => false,
            }
        };
        if killed {
            info!(%addr, "root node disconnected, mesh killed");
            if let Some(events) = self.events.get() {
                events.mesh_killed();
            }
        }
    }
}
