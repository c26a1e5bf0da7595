//! The mesh transport envelope.
//!
//! Every frame on the mesh TCP link is `{mac, layer, data}` where `data`
//! holds exactly one key naming the payload kind. That key is the canonical
//! discriminator; [`MeshData`] maps it to a schema at compile time.

use serde::{Deserialize, Serialize};

use super::device::{
    ConnectionEvent, DeviceConfiguration, DeviceEvent, DeviceIdentity, DeviceIntegrity,
    DeviceRequest, DeviceStatus, DeviceUpdate, IntegrityEvent,
};

/// Mesh layer used when a device has not reported one.
pub const DEFAULT_MESH_LAYER: u32 = 1;

fn default_layer() -> u32 {
    DEFAULT_MESH_LAYER
}

/// Tagged payload of a mesh envelope. The serialized form is a single-key
/// object, e.g. `{"identity": {...}}` or `{"connection_event": "connected"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MeshData {
    /// Transport-level node connect/disconnect. Intercepted by the channel
    /// manager, never forwarded to a device session.
    #[serde(rename = "connection_event")]
    Connection(ConnectionEvent),
    /// Device identity announcement.
    #[serde(rename = "identity")]
    Identity(DeviceIdentity),
    /// Device status announcement.
    #[serde(rename = "status")]
    Status(DeviceStatus),
    /// Device event.
    #[serde(rename = "event")]
    Event(DeviceEvent),
    /// Integrity probe.
    #[serde(rename = "integrity")]
    Integrity(IntegrityEvent),
    /// Identity/status request addressed to a device.
    #[serde(rename = "request")]
    Request(DeviceRequest),
    /// Configuration push addressed to a device.
    #[serde(rename = "config")]
    Config(DeviceConfiguration),
    /// Property update addressed to a device.
    #[serde(rename = "update")]
    Update(DeviceUpdate),
}

impl MeshData {
    /// Flatten a device-facing payload to the transport-neutral text a
    /// session decodes. `None` for transport-level payloads.
    pub fn to_wire_text(&self) -> Option<String> {
        let value = match self {
            Self::Connection(_) => return None,
            Self::Identity(identity) => serde_json::to_value(identity),
            Self::Status(status) => serde_json::to_value(status),
            Self::Event(event) => serde_json::to_value(event),
            Self::Integrity(event) => serde_json::to_value(DeviceIntegrity { integrity: *event }),
            Self::Request(request) => serde_json::to_value(request),
            Self::Config(config) => serde_json::to_value(config),
            Self::Update(update) => serde_json::to_value(update),
        };
        value.ok().map(|v| v.to_string())
    }
}

/// Wire wrapper for every mesh-transport payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshEnvelope {
    /// MAC address the payload comes from or goes to.
    pub mac: String,
    /// Mesh layer of the node.
    #[serde(default = "default_layer")]
    pub layer: u32,
    /// Tagged payload.
    pub data: MeshData,
}

impl MeshEnvelope {
    /// Wrap a payload for the given MAC and layer.
    pub fn new(mac: impl Into<String>, layer: u32, data: MeshData) -> Self {
        Self {
            mac: mac.into(),
            layer,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_event_envelope_decodes() {
        let raw = json!({"mac": "AA:BB", "layer": 2, "data": {"connection_event": "connected"}});
        let envelope: MeshEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.mac, "AA:BB");
        assert_eq!(envelope.layer, 2);
        assert_eq!(envelope.data, MeshData::Connection(ConnectionEvent::Connected));
    }

    #[test]
    fn layer_defaults_to_one() {
        let raw = json!({"mac": "AA:BB", "data": {"connection_event": "disconnected"}});
        let envelope: MeshEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.layer, DEFAULT_MESH_LAYER);
    }

    #[test]
    fn identity_envelope_roundtrips() {
        let raw = json!({
            "mac": "AA:BB",
            "layer": 1,
            "data": {"identity": {"serial": "ABC", "props": {}, "listens": ["x"]}},
        });
        let envelope: MeshEnvelope = serde_json::from_value(raw.clone()).unwrap();
        match &envelope.data {
            MeshData::Identity(identity) => assert_eq!(identity.serial, "ABC"),
            other => panic!("expected identity payload, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&envelope).unwrap(), raw);
    }

    #[test]
    fn request_envelope_serializes_with_data_tag() {
        let envelope = MeshEnvelope::new("AA:BB", 1, MeshData::Request(DeviceRequest::status("ABC")));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({"mac": "AA:BB", "layer": 1, "data": {"request": {"serial": "ABC", "request": "status"}}})
        );
    }

    #[test]
    fn unknown_data_tag_is_a_decode_error() {
        let raw = json!({"mac": "AA:BB", "layer": 1, "data": {"telemetry": {}}});
        assert!(serde_json::from_value::<MeshEnvelope>(raw).is_err());
    }

    #[test]
    fn wire_text_flattens_device_payloads() {
        let status: DeviceStatus =
            serde_json::from_value(json!({"serial": "ABC", "status": {"on": true}})).unwrap();
        let text = MeshData::Status(status).to_wire_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"serial": "ABC", "status": {"on": true}}));
    }

    #[test]
    fn wire_text_flattens_integrity_probe() {
        let text = MeshData::Integrity(IntegrityEvent::Check).to_wire_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"integrity": "check"}));
    }

    #[test]
    fn wire_text_withholds_connection_events() {
        assert!(MeshData::Connection(ConnectionEvent::Connected)
            .to_wire_text()
            .is_none());
    }
}
