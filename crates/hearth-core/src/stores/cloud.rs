//! Cloud notification bridge boundary.

use tracing::info;

/// Fire-and-forget bridge to the external cloud notification service.
pub trait CloudBridge: Send + Sync {
    /// Emit a named event to the cloud. Best-effort; failures stay inside
    /// the implementation.
    fn send_event(&self, name: &str);
}

/// Bridge implementation that only logs. Used when no cloud credential is
/// configured.
#[derive(Debug, Default)]
pub struct LoggingCloudBridge;

impl CloudBridge for LoggingCloudBridge {
    fn send_event(&self, name: &str) {
        info!(event = name, "cloud event emitted (no bridge configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_bridge_is_callable() {
        let bridge = LoggingCloudBridge;
        bridge.send_event("house.open");
    }
}
