//! Wire protocol for the hearth gateway.
//!
//! Every message on the wire is a flat JSON object; which message a frame
//! carries is decided by a single discriminated decode per direction
//! ([`DeviceInbound`] / [`UserInbound`]) rather than per-consumer shape
//! probing. The mesh transport additionally wraps each message in a
//! [`MeshEnvelope`] whose `data` key name is the canonical discriminator.

pub mod device;
pub mod dispatch;
pub mod mesh;
pub mod user;

pub use device::{
    ConnectionEvent, DeviceConfiguration, DeviceEvent, DeviceIdentity, DeviceIntegrity,
    DeviceRequest, DeviceStatus, DeviceUpdate, IntegrityEvent, RequestKind,
};
pub use dispatch::{DeviceInbound, UserInbound, WirePayload};
pub use mesh::{DEFAULT_MESH_LAYER, MeshData, MeshEnvelope};
pub use user::{DeviceList, DeviceSnapshot, DeviceTranslation, PingResponse, UserAccess, UserDataRequest, UserRole};
