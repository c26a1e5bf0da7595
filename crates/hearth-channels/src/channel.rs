//! The channel abstraction and its trait seams.

use std::sync::Arc;

use hearth_core::protocol::WirePayload;
use parking_lot::RwLock;

/// Receives the decoded text frames of one channel. Implemented by the
/// session (device or user) that owns the channel.
pub trait MessageSink: Send + Sync {
    /// Handle one decoded text frame. Called synchronously from the
    /// transport's read task; frames for one channel arrive in order.
    fn on_message(&self, raw: &str);
}

/// A transport-agnostic bidirectional message endpoint for one peer.
pub trait Channel: Send + Sync {
    /// Transport-specific identity: MAC address, `ip:port`, or connection id.
    fn identity(&self) -> &str;

    /// Attach the session that receives this channel's inbound frames.
    fn attach(&self, sink: Arc<dyn MessageSink>);

    /// Serialize and transmit a payload. Never blocks beyond the
    /// transport's native send latency; if the transport is not ready the
    /// write degrades to a logged no-op.
    fn write(&self, payload: &WirePayload);

    /// Release the channel's resources. Safe to call more than once.
    fn close(&self);
}

/// Connect/disconnect notifications from a channel manager. Implemented by
/// the session manager the channel manager is registered with.
pub trait ChannelEvents: Send + Sync {
    /// A new channel is live. Fired exactly once per channel.
    fn channel_connected(&self, channel: Arc<dyn Channel>);

    /// A channel is gone. Fired exactly once per connected channel.
    fn channel_disconnected(&self, channel: Arc<dyn Channel>);
}

/// Owner of one transport listener, producing [`Channel`]s.
pub trait ChannelManager: Send + Sync {
    /// Stable transport kind ("mesh", "tcp", "websocket", "memory"). Session
    /// managers deduplicate registrations by this value.
    fn kind(&self) -> &'static str;

    /// Register the single listener receiving this manager's
    /// connect/disconnect notifications.
    fn bind(&self, events: Arc<dyn ChannelEvents>);
}

/// A set-once-readable slot for a trait-object listener. Connections racing
/// ahead of registration observe an empty slot and are dropped with a log
/// line rather than an error.
pub(crate) struct Slot<T: ?Sized> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Slot<T> {
    pub(crate) fn empty() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub(crate) fn set(&self, value: Arc<T>) {
        *self.inner.write() = Some(value);
    }

    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.inner.read().clone()
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = None;
    }
}
