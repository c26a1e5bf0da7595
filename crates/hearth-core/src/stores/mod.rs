//! Store boundaries consumed by the gateway core.
//!
//! Access control, device configuration, and translation records live
//! outside the core's correctness argument; the core only calls these
//! traits. Save/delete return `bool` — persistence failures are logged by
//! the implementation and never block the caller.

pub mod cloud;
pub mod memory;
pub mod sqlite;

use crate::protocol::{DeviceConfiguration, DeviceTranslation, UserAccess};

pub use cloud::{CloudBridge, LoggingCloudBridge};
pub use memory::{MemoryAccessStore, MemoryConfigStore, MemoryTranslationStore, RecordingCloudBridge};
pub use sqlite::SqliteStore;

/// Access-control records for connecting users.
pub trait AccessStore: Send + Sync {
    /// Persist an access record, replacing any record with the same
    /// identifier.
    fn save(&self, access: &UserAccess) -> bool;

    /// All stored access records.
    fn list(&self) -> Vec<UserAccess>;

    /// Whether an access record exists for this user/access pair.
    fn validate(&self, user_identifier: &str, access_identifier: &str) -> bool;
}

/// Saved per-device configuration.
pub trait ConfigStore: Send + Sync {
    /// Saved configuration for a serial number, if any.
    fn get(&self, serial: &str) -> Option<DeviceConfiguration>;

    /// Persist a configuration for a serial number.
    fn save(&self, serial: &str, config: &DeviceConfiguration) -> bool;

    /// Remove the saved configuration for a serial number.
    fn delete(&self, serial: &str) -> bool;
}

/// Saved per-device accessibility translations.
pub trait TranslationStore: Send + Sync {
    /// Saved translation for a serial number, if any.
    fn get(&self, serial: &str) -> Option<DeviceTranslation>;

    /// Persist a translation for a serial number.
    fn save(&self, serial: &str, translation: &DeviceTranslation) -> bool;

    /// Remove the saved translation for a serial number.
    fn delete(&self, serial: &str) -> bool;
}
