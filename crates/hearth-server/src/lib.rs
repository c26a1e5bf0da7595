//! # hearth-server
//!
//! Wires the gateway together: one [`core::HearthCore`] owns the session
//! managers, stores, routers, and transport listeners, constructed once at
//! startup with explicit dependency injection.

#![deny(unsafe_code)]

pub mod core;

pub use core::HearthCore;
