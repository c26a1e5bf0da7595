//! Messages exchanged with device sessions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The first fact a device reveals about itself. Set once per session,
/// immutable thereafter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Device serial number.
    pub serial: String,
    /// Free-form property map.
    pub props: HashMap<String, String>,
    /// Event names this device subscribes to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listens: Vec<String>,
    /// Configuration schema the device advertises, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HashMap<String, String>>,
}

impl DeviceIdentity {
    /// Whether this device subscribes to the given event name.
    pub fn listens_to(&self, event: &str) -> bool {
        self.listens.iter().any(|name| name == event)
    }
}

/// Current device status. Overwritten on each update; requires identity to
/// already be set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Device serial number.
    pub serial: String,
    /// Free-form status map.
    pub status: Map<String, Value>,
}

/// An event raised by a device, delivered by subscription (`target` absent)
/// or directed at a single device (`target` present).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Serial number of the emitting device.
    pub serial: String,
    /// Event name, matched against other devices' `listens` lists.
    pub name: String,
    /// Event arguments.
    pub arguments: Map<String, Value>,
    /// Optional serial number of the one device this event addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Integrity probe verbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityEvent {
    /// Ask the session to re-drive whatever identity/status step is missing.
    Check,
}

/// Integrity request, sent to a session whose prior state may have been lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIntegrity {
    /// The requested probe.
    pub integrity: IntegrityEvent,
}

impl DeviceIntegrity {
    /// The `{integrity: "check"}` probe.
    pub fn check() -> Self {
        Self {
            integrity: IntegrityEvent::Check,
        }
    }
}

/// What a [`DeviceRequest`] asks the device to announce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Request the device's identity.
    Identity,
    /// Request the device's current status.
    Status,
}

/// Outbound request asking a device to re-announce identity or status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    /// Serial number the request addresses. Empty for identity requests,
    /// where the session has no serial on record yet.
    pub serial: String,
    /// The requested announcement.
    pub request: RequestKind,
}

impl DeviceRequest {
    /// Identity request for a session that has not identified yet.
    pub fn identity() -> Self {
        Self {
            serial: String::new(),
            request: RequestKind::Identity,
        }
    }

    /// Status request addressed to `serial`.
    pub fn status(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            request: RequestKind::Status,
        }
    }
}

/// Outbound configuration push for a device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    /// Device serial number.
    pub serial: String,
    /// Configuration values to apply.
    pub config: Map<String, Value>,
}

/// Outbound property update for a device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    /// Device serial number.
    pub serial: String,
    /// Properties to update.
    pub update: Map<String, Value>,
}

/// Transport-level connection state change for a mesh node. Reserved for the
/// channel-manager layer; never surfaced to device sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionEvent {
    /// A node joined the mesh.
    Connected,
    /// A node left the mesh.
    Disconnected,
}
