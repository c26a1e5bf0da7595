//! # hearth-sessions
//!
//! Live session state for every connected peer. A [`Device`] or [`User`]
//! wraps exactly one channel, decodes each inbound frame once into a typed
//! message, and notifies the observers registered with its manager.
//! [`DeviceManager`] and [`UserManager`] own the session sets and bridge
//! channel managers to sessions.

#![deny(unsafe_code)]

pub mod device;
pub mod device_manager;
pub mod observers;
pub mod user;
pub mod user_manager;

pub use device::Device;
pub use device_manager::DeviceManager;
pub use observers::{DeviceObserver, ObserverRegistry, UserObserver};
pub use user::User;
pub use user_manager::UserManager;
