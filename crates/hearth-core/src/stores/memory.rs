//! In-memory store implementations, used in tests and for servers running
//! without a database file.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::protocol::{DeviceConfiguration, DeviceTranslation, UserAccess};

use super::cloud::CloudBridge;
use super::{AccessStore, ConfigStore, TranslationStore};

/// In-memory [`AccessStore`].
#[derive(Debug, Default)]
pub struct MemoryAccessStore {
    records: Mutex<Vec<UserAccess>>,
}

impl MemoryAccessStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given records.
    pub fn with_records(records: Vec<UserAccess>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl AccessStore for MemoryAccessStore {
    fn save(&self, access: &UserAccess) -> bool {
        let mut records = self.records.lock();
        records.retain(|r| r.identifier != access.identifier);
        records.push(access.clone());
        true
    }

    fn list(&self) -> Vec<UserAccess> {
        self.records.lock().clone()
    }

    fn validate(&self, user_identifier: &str, access_identifier: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.user_identifier == user_identifier && r.identifier == access_identifier)
    }
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: Mutex<HashMap<String, DeviceConfiguration>>,
}

impl MemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, serial: &str) -> Option<DeviceConfiguration> {
        self.records.lock().get(serial).cloned()
    }

    fn save(&self, serial: &str, config: &DeviceConfiguration) -> bool {
        let _ = self
            .records
            .lock()
            .insert(serial.to_owned(), config.clone());
        true
    }

    fn delete(&self, serial: &str) -> bool {
        self.records.lock().remove(serial).is_some()
    }
}

/// In-memory [`TranslationStore`].
#[derive(Debug, Default)]
pub struct MemoryTranslationStore {
    records: Mutex<HashMap<String, DeviceTranslation>>,
}

impl MemoryTranslationStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranslationStore for MemoryTranslationStore {
    fn get(&self, serial: &str) -> Option<DeviceTranslation> {
        self.records.lock().get(serial).cloned()
    }

    fn save(&self, serial: &str, translation: &DeviceTranslation) -> bool {
        let _ = self
            .records
            .lock()
            .insert(serial.to_owned(), translation.clone());
        true
    }

    fn delete(&self, serial: &str) -> bool {
        self.records.lock().remove(serial).is_some()
    }
}

/// Test double for [`CloudBridge`] that records every emitted event name.
#[derive(Debug, Default)]
pub struct RecordingCloudBridge {
    events: Mutex<Vec<String>>,
}

impl RecordingCloudBridge {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Event names emitted so far, in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl CloudBridge for RecordingCloudBridge {
    fn send_event(&self, name: &str) {
        self.events.lock().push(name.to_owned());
    }
}
