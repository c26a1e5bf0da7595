//! WebSocket transport for user-facing clients.
//!
//! An axum server owns the `/ws` upgrade endpoint and a small `/health`
//! probe. Each upgraded socket becomes one channel identified by a
//! generated connection id; outbound traffic flows through a bounded queue
//! drained by a writer task that also runs ping/pong liveness.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use hearth_core::config::WsSection;
use hearth_core::errors::ChannelError;
use hearth_core::protocol::WirePayload;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{Channel, ChannelEvents, ChannelManager, MessageSink, Slot};

const OUTBOUND_QUEUE: usize = 256;

/// Interval between server-initiated Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong before considering the client dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(90);

/// Channel for one WebSocket client.
pub struct WsChannel {
    id: String,
    tx: mpsc::Sender<String>,
    sink: Slot<dyn MessageSink>,
    closed: AtomicBool,
    last_pong: Mutex<Instant>,
}

impl WsChannel {
    fn new(id: String, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            sink: Slot::empty(),
            closed: AtomicBool::new(false),
            last_pong: Mutex::new(Instant::now()),
        }
    }

    fn deliver(&self, raw: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            sink.on_message(raw);
        }
    }

    fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }
}

impl Channel for WsChannel {
    fn identity(&self) -> &str {
        &self.id
    }

    fn attach(&self, sink: Arc<dyn MessageSink>) {
        self.sink.set(sink);
    }

    fn write(&self, payload: &WirePayload) {
        if self.closed.load(Ordering::Acquire) {
            warn!(client_id = %self.id, "write on closed websocket channel ignored");
            return;
        }
        let Some(text) = payload.encode() else {
            return;
        };
        if self.tx.try_send(text).is_err() {
            warn!(client_id = %self.id, "websocket outbound queue unavailable, frame dropped");
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sink.clear();
            debug!(client_id = %self.id, "websocket channel closed");
        }
    }
}

/// Manager for WebSocket channels.
pub struct WsChannelManager {
    local_addr: SocketAddr,
    channels: DashMap<String, Arc<WsChannel>>,
    events: Slot<dyn ChannelEvents>,
}

impl WsChannelManager {
    /// Transport kind used for registration deduplication.
    pub const KIND: &'static str = "websocket";

    /// Bind the HTTP listener and start serving WebSocket upgrades.
    pub async fn start(config: &WsSection) -> Result<Arc<Self>, ChannelError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ChannelError::bind("websocket", addr.clone(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ChannelError::bind("websocket", addr, e))?;

        let manager = Arc::new(Self {
            local_addr,
            channels: DashMap::new(),
            events: Slot::empty(),
        });
        let app = manager.router();
        info!(%local_addr, "websocket channel manager listening");
        drop(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "websocket server stopped");
            }
        }));
        Ok(manager)
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live WebSocket channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Build the axum router serving `/ws` and `/health`.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(Arc::clone(self))
    }

    async fn run_session(self: Arc<Self>, socket: WebSocket) {
        let id = Uuid::now_v7().to_string();
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE);
        let channel = Arc::new(WsChannel::new(id.clone(), tx));
        let _ = self.channels.insert(id.clone(), Arc::clone(&channel));

        info!(client_id = %id, "websocket client connected");
        if let Some(events) = self.events.get() {
            events.channel_connected(Arc::clone(&channel) as Arc<dyn Channel>);
        }

        let (mut ws_tx, mut ws_rx) = socket.split();

        // Outbound forwarder with periodic Ping frames.
        let ping_channel = Arc::clone(&channel);
        let outbound = tokio::spawn(async move {
            let mut ping_interval = tokio::time::interval(PING_INTERVAL);
            // Skip the immediate first tick.
            let _ = ping_interval.tick().await;
            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = ping_interval.tick() => {
                        if ping_channel.last_pong_elapsed() > PONG_TIMEOUT {
                            warn!(client_id = %ping_channel.id, "client unresponsive, disconnecting");
                            break;
                        }
                        if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => channel.deliver(text.as_str()),
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => channel.deliver(text),
                    Err(_) => debug!(client_id = %id, "non-UTF8 binary frame dropped"),
                },
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => channel.mark_alive(),
            }
        }

        info!(client_id = %id, "websocket client disconnected");
        outbound.abort();
        if self.channels.remove(&id).is_some() {
            if let Some(events) = self.events.get() {
                events.channel_disconnected(Arc::clone(&channel) as Arc<dyn Channel>);
            }
            channel.close();
        }
    }
}

impl ChannelManager for WsChannelManager {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn bind(&self, events: Arc<dyn ChannelEvents>) {
        self.events.set(events);
    }
}

async fn ws_handler(
    State(manager): State<Arc<WsChannelManager>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| manager.run_session(socket))
}

async fn health_handler(State(manager): State<Arc<WsChannelManager>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": manager.channel_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt as _, StreamExt as _};
    use parking_lot::Mutex as SyncMutex;
    use tokio::time::sleep;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use hearth_core::protocol::{DeviceStatus, PingResponse};

    #[derive(Default)]
    struct EventRecorder {
        connected: SyncMutex<Vec<Arc<dyn Channel>>>,
        disconnected: SyncMutex<Vec<String>>,
    }

    impl ChannelEvents for EventRecorder {
        fn channel_connected(&self, channel: Arc<dyn Channel>) {
            self.connected.lock().push(channel);
        }

        fn channel_disconnected(&self, channel: Arc<dyn Channel>) {
            self.disconnected.lock().push(channel.identity().to_owned());
        }
    }

    struct FrameRecorder {
        seen: SyncMutex<Vec<String>>,
    }

    impl MessageSink for FrameRecorder {
        fn on_message(&self, raw: &str) {
            self.seen.lock().push(raw.to_owned());
        }
    }

    async fn boot() -> (Arc<WsChannelManager>, Arc<EventRecorder>) {
        let manager = WsChannelManager::start(&WsSection {
            host: "127.0.0.1".into(),
            port: 0,
        })
        .await
        .unwrap();
        let recorder = Arc::new(EventRecorder::default());
        manager.bind(recorder.clone());
        (manager, recorder)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn upgrade_fires_channel_connected() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (_socket, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);
        assert_eq!(manager.channel_count(), 1);
    }

    #[tokio::test]
    async fn client_text_reaches_attached_sink() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);

        let frames = Arc::new(FrameRecorder {
            seen: SyncMutex::new(Vec::new()),
        });
        recorder.connected.lock()[0].attach(frames.clone());

        socket
            .send(WsMessage::Text(r#"{"data_request":"ping"}"#.into()))
            .await
            .unwrap();
        assert!(wait_until(|| frames.seen.lock().len() == 1).await);
        assert!(frames.seen.lock()[0].contains("ping"));
    }

    #[tokio::test]
    async fn write_reaches_client() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);

        let status: DeviceStatus =
            serde_json::from_value(serde_json::json!({"serial": "ABC", "status": {"on": true}}))
                .unwrap();
        recorder.connected.lock()[0].write(&WirePayload::Status(status));

        let msg = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("client should receive the frame")
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(value["serial"], "ABC");
        assert_eq!(value["status"]["on"], true);
    }

    #[tokio::test]
    async fn client_close_fires_channel_disconnected() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| manager.channel_count() == 1).await);

        socket.close(None).await.unwrap();
        assert!(wait_until(|| recorder.disconnected.lock().len() == 1).await);
        assert_eq!(manager.channel_count(), 0);
    }

    #[tokio::test]
    async fn binary_utf8_frames_are_delivered() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);

        let frames = Arc::new(FrameRecorder {
            seen: SyncMutex::new(Vec::new()),
        });
        recorder.connected.lock()[0].attach(frames.clone());

        socket
            .send(WsMessage::Binary(br#"{"data_request":"getDevices"}"#.to_vec().into()))
            .await
            .unwrap();
        assert!(wait_until(|| frames.seen.lock().len() == 1).await);
    }

    #[tokio::test]
    async fn write_without_representation_is_safe() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (_socket, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);
        // Every payload kind has a flat representation; ping reply included.
        recorder.connected.lock()[0].write(&WirePayload::Ping(PingResponse::new(None)));
    }

    #[tokio::test]
    async fn distinct_clients_get_distinct_ids() {
        let (manager, recorder) = boot().await;
        let url = format!("ws://{}/ws", manager.local_addr());
        let (_a, _) = connect_async(url.as_str()).await.unwrap();
        let (_b, _) = connect_async(url.as_str()).await.unwrap();
        assert!(wait_until(|| manager.channel_count() == 2).await);
        let connected = recorder.connected.lock();
        assert_ne!(connected[0].identity(), connected[1].identity());
    }
}
