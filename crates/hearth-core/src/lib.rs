//! # hearth-core
//!
//! Foundation crate for the hearth gateway: the device and user wire
//! protocol, the mesh envelope, the error hierarchy, server configuration,
//! and the store boundaries (access control, device configuration,
//! translations, cloud bridge) the gateway core calls but does not own.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod protocol;
pub mod stores;

pub use config::HearthConfig;
pub use errors::{ChannelError, GatewayError, StoreError};
