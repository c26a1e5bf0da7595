//! Single-pass message dispatch.
//!
//! A raw text frame decodes into at most one typed message per direction.
//! Frames matching none of the known shapes are steady-state traffic for
//! some other consumer, not errors; `decode` returns `None` for them.

use serde::{Deserialize, Serialize};

use super::device::{
    DeviceConfiguration, DeviceEvent, DeviceIdentity, DeviceIntegrity, DeviceRequest, DeviceStatus,
    DeviceUpdate,
};
use super::mesh::MeshData;
use super::user::{DeviceList, DeviceTranslation, PingResponse, UserAccess, UserDataRequest};

/// Typed view of a frame received from a device session.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeviceInbound {
    /// Integrity probe.
    Integrity(DeviceIntegrity),
    /// Identity announcement.
    Identity(DeviceIdentity),
    /// Status announcement.
    Status(DeviceStatus),
    /// Raised event.
    Event(DeviceEvent),
}

impl DeviceInbound {
    /// Decode a raw frame, or `None` when it matches no device shape.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Typed view of a frame received from a user session.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UserInbound {
    /// Access credential.
    Access(UserAccess),
    /// Device property update request.
    Update(DeviceUpdate),
    /// Device configuration request.
    Config(DeviceConfiguration),
    /// Device translation submission.
    Translation(DeviceTranslation),
    /// Generic data request.
    DataRequest(UserDataRequest),
}

impl UserInbound {
    /// Decode a raw frame, or `None` when it matches no user shape.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Union of every message the gateway writes to a channel. Serializes to the
/// flat wire form; the mesh transport re-wraps it via [`Self::to_mesh_data`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WirePayload {
    /// Identity announcement (loop-back simulated devices only).
    Identity(DeviceIdentity),
    /// Status announcement, broadcast to users.
    Status(DeviceStatus),
    /// Device event, forwarded between devices.
    Event(DeviceEvent),
    /// Integrity probe.
    Integrity(DeviceIntegrity),
    /// Identity/status request to a device.
    Request(DeviceRequest),
    /// Configuration push to a device.
    Config(DeviceConfiguration),
    /// Property update to a device.
    Update(DeviceUpdate),
    /// Device list reply to a user.
    DeviceList(DeviceList),
    /// Ping reply to a user.
    Ping(PingResponse),
}

impl WirePayload {
    /// Serialize to the flat wire form.
    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Re-wrap as a tagged mesh payload. `None` for the user-only replies
    /// that have no mesh representation.
    pub fn to_mesh_data(&self) -> Option<MeshData> {
        match self {
            Self::Identity(identity) => Some(MeshData::Identity(identity.clone())),
            Self::Status(status) => Some(MeshData::Status(status.clone())),
            Self::Event(event) => Some(MeshData::Event(event.clone())),
            Self::Integrity(probe) => Some(MeshData::Integrity(probe.integrity)),
            Self::Request(request) => Some(MeshData::Request(request.clone())),
            Self::Config(config) => Some(MeshData::Config(config.clone())),
            Self::Update(update) => Some(MeshData::Update(update.clone())),
            Self::DeviceList(_) | Self::Ping(_) => None,
        }
    }
}

impl From<DeviceRequest> for WirePayload {
    fn from(request: DeviceRequest) -> Self {
        Self::Request(request)
    }
}

impl From<DeviceStatus> for WirePayload {
    fn from(status: DeviceStatus) -> Self {
        Self::Status(status)
    }
}

impl From<DeviceEvent> for WirePayload {
    fn from(event: DeviceEvent) -> Self {
        Self::Event(event)
    }
}

impl From<DeviceConfiguration> for WirePayload {
    fn from(config: DeviceConfiguration) -> Self {
        Self::Config(config)
    }
}

impl From<DeviceUpdate> for WirePayload {
    fn from(update: DeviceUpdate) -> Self {
        Self::Update(update)
    }
}
