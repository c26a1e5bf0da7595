//! Messages exchanged with user sessions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role a user holds on this server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full administrative access.
    Administrator,
    /// Regular user.
    User,
}

/// Access credential presented by a connecting user and validated against
/// the access store. Immutable once accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    /// Access record identifier.
    pub identifier: String,
    /// Identifier of the server this access applies to.
    pub server_identifier: String,
    /// Identifier of the user holding the access.
    pub user_identifier: String,
    /// Granted role.
    pub role: UserRole,
}

/// Generic data request from a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataRequest {
    /// Requested dataset.
    pub data_request: String,
}

impl UserDataRequest {
    /// Request value asking for the connected device list.
    pub const GET_DEVICES: &'static str = "getDevices";
    /// Request value asking for a server liveness reply.
    pub const PING: &'static str = "ping";
}

/// Reply to a `ping` data request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    /// Server identifier, if one is configured. Serialized as `null`
    /// otherwise so clients can distinguish "no id" from "no reply".
    pub id: Option<String>,
    /// Server software name.
    pub server_name: String,
}

impl PingResponse {
    /// Server software name reported on the wire.
    pub const SERVER_NAME: &'static str = "hearth";

    /// Build a ping reply for the given server identifier.
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            server_name: Self::SERVER_NAME.to_owned(),
        }
    }
}

/// Accessibility translation for a device, submitted by users and persisted
/// by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTranslation {
    /// Serial number of the translated device.
    pub serial: String,
    /// Translated device name.
    pub name_translation: String,
    /// Translations of the device's property names.
    pub props_translation: HashMap<String, String>,
}

/// One device in a `getDevices` reply. Only devices that have announced
/// both identity and status appear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Device serial number.
    pub serial: String,
    /// Identity property map.
    pub props: HashMap<String, String>,
    /// Event names the device subscribes to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listens: Vec<String>,
    /// Last announced status.
    pub status: Map<String, Value>,
    /// Saved configuration, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    /// Saved translation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<DeviceTranslation>,
}

/// Reply to a `getDevices` data request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceList {
    /// Connected, fully announced devices.
    pub devices: Vec<DeviceSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_roundtrips() {
        let raw = json!({
            "identifier": "acc-1",
            "server_identifier": "srv-1",
            "user_identifier": "usr-1",
            "role": "administrator",
        });
        let access: UserAccess = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(access.role, UserRole::Administrator);
        assert_eq!(serde_json::to_value(&access).unwrap(), raw);
    }

    #[test]
    fn access_rejects_unknown_role() {
        let raw = json!({
            "identifier": "acc-1",
            "server_identifier": "srv-1",
            "user_identifier": "usr-1",
            "role": "owner",
        });
        assert!(serde_json::from_value::<UserAccess>(raw).is_err());
    }

    #[test]
    fn ping_reply_includes_null_id() {
        let value = serde_json::to_value(PingResponse::new(None)).unwrap();
        assert_eq!(value, json!({"id": null, "server_name": "hearth"}));
    }

    #[test]
    fn ping_reply_with_id() {
        let value = serde_json::to_value(PingResponse::new(Some("srv-9".into()))).unwrap();
        assert_eq!(value["id"], "srv-9");
    }

    #[test]
    fn data_request_constants() {
        assert_eq!(UserDataRequest::GET_DEVICES, "getDevices");
        assert_eq!(UserDataRequest::PING, "ping");
    }

    #[test]
    fn snapshot_skips_absent_extras() {
        let snapshot = DeviceSnapshot {
            serial: "ABC".into(),
            props: HashMap::new(),
            listens: Vec::new(),
            status: Map::new(),
            config: None,
            translations: None,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("config").is_none());
        assert!(value.get("translations").is_none());
        assert!(value.get("listens").is_none());
    }
}
