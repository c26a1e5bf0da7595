//! Raw TCP transport: newline-delimited JSON frames, one channel per
//! connection, identified by the peer's `ip:port`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use hearth_core::config::TcpSection;
use hearth_core::errors::ChannelError;
use hearth_core::protocol::WirePayload;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelEvents, ChannelManager, MessageSink, Slot};

const MAX_FRAME_BYTES: usize = 1024 * 1024;
const OUTBOUND_QUEUE: usize = 256;

/// Channel for one raw TCP connection.
pub struct TcpChannel {
    ip_port: String,
    tx: mpsc::Sender<String>,
    sink: Slot<dyn MessageSink>,
    closed: AtomicBool,
}

impl TcpChannel {
    fn new(ip_port: String, tx: mpsc::Sender<String>) -> Self {
        Self {
            ip_port,
            tx,
            sink: Slot::empty(),
            closed: AtomicBool::new(false),
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
}

impl Channel for TcpChannel {
    fn identity(&self) -> &str {
        &self.ip_port
    }

    fn attach(&self, sink: Arc<dyn MessageSink>) {
        self.sink.set(sink);
    }

    fn write(&self, payload: &WirePayload) {
        if self.closed.load(Ordering::Acquire) {
            warn!(peer = %self.ip_port, "write on closed tcp channel ignored");
            return;
        }
        let Some(line) = payload.encode() else {
            return;
        };
        if self.tx.try_send(line).is_err() {
            warn!(peer = %self.ip_port, "tcp outbound queue unavailable, frame dropped");
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sink.clear();
            debug!(peer = %self.ip_port, "tcp channel closed");
        }
    }
}

/// Manager for raw TCP channels.
pub struct TcpChannelManager {
    local_addr: SocketAddr,
    channels: DashMap<String, Arc<TcpChannel>>,
    events: Slot<dyn ChannelEvents>,
}

impl TcpChannelManager {
    /// Transport kind used for registration deduplication.
    pub const KIND: &'static str = "tcp";

    /// Bind the TCP listener and start accepting device connections.
    pub async fn start(config: &TcpSection) -> Result<Arc<Self>, ChannelError> {
        let addr = format!("0.0.0.0:{}", config.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ChannelError::bind("tcp", addr.clone(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ChannelError::bind("tcp", addr, e))?;

        let manager = Arc::new(Self {
            local_addr,
            channels: DashMap::new(),
            events: Slot::empty(),
        });
        info!(%local_addr, "tcp channel manager listening");
        drop(tokio::spawn(Arc::clone(&manager).accept_loop(listener)));
        Ok(manager)
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live TCP channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => self.clone().handle_accept(stream, addr),
                Err(e) => warn!(error = %e, "tcp accept failed"),
            }
        }
    }

    fn handle_accept(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let ip_port = addr.to_string();
        if self.channels.contains_key(&ip_port) {
            warn!(peer = %ip_port, "connection for registered peer, dropping new socket");
            drop(stream);
            return;
        }

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let channel = Arc::new(TcpChannel::new(ip_port.clone(), tx));
        let _ = self.channels.insert(ip_port.clone(), Arc::clone(&channel));
        debug!(peer = %ip_port, "tcp channel connected");
        if let Some(events) = self.events.get() {
            events.channel_connected(Arc::clone(&channel) as Arc<dyn Channel>);
        }
        drop(tokio::spawn(self.run_connection(stream, channel, rx)));
    }

    async fn run_connection(
        self: Arc<Self>,
        stream: TcpStream,
        channel: Arc<TcpChannel>,
        mut rx: mpsc::Receiver<String>,
    ) {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(line) => {
                        if framed.send(line).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                inbound = framed.next() => match inbound {
                    Some(Ok(line)) => channel.deliver(&line),
                    Some(Err(e)) => {
                        warn!(peer = %channel.ip_port, error = %e, "tcp frame error, dropping connection");
                        break;
                    }
                    None => break,
                },
            }
        }

        if self.channels.remove(&channel.ip_port).is_some() {
            debug!(peer = %channel.ip_port, "tcp channel disconnected");
            if let Some(events) = self.events.get() {
                events.channel_disconnected(Arc::clone(&channel) as Arc<dyn Channel>);
            }
            channel.close();
        }
    }
}

impl ChannelManager for TcpChannelManager {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn bind(&self, events: Arc<dyn ChannelEvents>) {
        self.events.set(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::sleep;

    use hearth_core::protocol::DeviceRequest;

    #[derive(Default)]
    struct EventRecorder {
        connected: Mutex<Vec<Arc<dyn Channel>>>,
        disconnected: Mutex<Vec<String>>,
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
        seen: Mutex<Vec<String>>,
    }

    impl MessageSink for FrameRecorder {
        fn on_message(&self, raw: &str) {
            self.seen.lock().push(raw.to_owned());
        }
    }

    async fn boot() -> (Arc<TcpChannelManager>, Arc<EventRecorder>) {
        let manager = TcpChannelManager::start(&TcpSection { listen_port: 0 })
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
    async fn connect_fires_channel_connected() {
        let (manager, recorder) = boot().await;
        let _client = TcpStream::connect(manager.local_addr()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);
        assert_eq!(manager.channel_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_fires_channel_disconnected() {
        let (manager, recorder) = boot().await;
        let client = TcpStream::connect(manager.local_addr()).await.unwrap();
        assert!(wait_until(|| manager.channel_count() == 1).await);
        drop(client);
        assert!(wait_until(|| recorder.disconnected.lock().len() == 1).await);
        assert_eq!(manager.channel_count(), 0);
    }

    #[tokio::test]
    async fn inbound_line_reaches_attached_sink() {
        let (manager, recorder) = boot().await;
        let mut client = TcpStream::connect(manager.local_addr()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);

        let frames = Arc::new(FrameRecorder {
            seen: Mutex::new(Vec::new()),
        });
        recorder.connected.lock()[0].attach(frames.clone());

        client
            .write_all(b"{\"serial\":\"ABC\",\"props\":{}}\n")
            .await
            .unwrap();
        assert!(wait_until(|| frames.seen.lock().len() == 1).await);
        assert!(frames.seen.lock()[0].contains("ABC"));
    }

    #[tokio::test]
    async fn write_reaches_client_as_line() {
        let (manager, recorder) = boot().await;
        let client = TcpStream::connect(manager.local_addr()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);

        let channel = recorder.connected.lock()[0].clone();
        channel.write(&WirePayload::Request(DeviceRequest::status("ABC")));

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        let _ = tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .expect("client should receive the frame")
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["serial"], "ABC");
        assert_eq!(value["request"], "status");
    }

    #[tokio::test]
    async fn write_after_close_is_noop() {
        let (manager, recorder) = boot().await;
        let _client = TcpStream::connect(manager.local_addr()).await.unwrap();
        assert!(wait_until(|| recorder.connected.lock().len() == 1).await);

        let channel = recorder.connected.lock()[0].clone();
        channel.close();
        channel.write(&WirePayload::Request(DeviceRequest::identity()));
    }

    #[tokio::test]
    async fn multiple_clients_get_distinct_channels() {
        let (manager, recorder) = boot().await;
        let _a = TcpStream::connect(manager.local_addr()).await.unwrap();
        let _b = TcpStream::connect(manager.local_addr()).await.unwrap();
        assert!(wait_until(|| manager.channel_count() == 2).await);
        let connected = recorder.connected.lock();
        assert_ne!(connected[0].identity(), connected[1].identity());
    }
}
