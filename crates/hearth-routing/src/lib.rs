//! # hearth-routing
//!
//! Routers are the gateway's cross-cutting rules: each one is a stateless
//! coordinator constructed once at startup with the managers and stores it
//! needs, then registered against the session managers' observer
//! registries. Decoding failures never reach a router; it only sees typed
//! session events.

#![deny(unsafe_code)]

pub mod config;
pub mod data_service;
pub mod event;
pub mod request;
pub mod status;
pub mod translate;
pub mod update;

use std::sync::Arc;

use hearth_sessions::{DeviceManager, UserManager};

pub use config::ConfigRouter;
pub use data_service::DevicesDataService;
pub use event::EventRouter;
pub use request::RequestRouter;
pub use status::StatusRouter;
pub use translate::TranslateRouter;
pub use update::UpdateRouter;

/// A routing rule. `register` subscribes the router to the session events
/// it coordinates; it is called exactly once, at startup.
pub trait Router: Send + Sync {
    /// Stable router name, used to deduplicate registrations.
    fn name(&self) -> &'static str;

    /// Subscribe to the relevant observer registries.
    fn register(self: Arc<Self>, devices: &DeviceManager, users: &UserManager);
}
