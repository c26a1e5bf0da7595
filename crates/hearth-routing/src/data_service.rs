//! Aggregated device data for introspection queries.

use std::sync::Arc;

use hearth_core::protocol::{DeviceList, DeviceSnapshot};
use hearth_core::stores::{ConfigStore, TranslationStore};
use hearth_sessions::DeviceManager;

/// Joins live device sessions with their saved configuration and
/// translation records.
pub struct DevicesDataService {
    devices: Arc<DeviceManager>,
    configs: Arc<dyn ConfigStore>,
    translations: Arc<dyn TranslationStore>,
}

impl DevicesDataService {
    /// Build the service.
    pub fn new(
        devices: Arc<DeviceManager>,
        configs: Arc<dyn ConfigStore>,
        translations: Arc<dyn TranslationStore>,
    ) -> Self {
        Self {
            devices,
            configs,
            translations,
        }
    }

    /// Snapshot of every device that has announced both identity and
    /// status, enriched with stored configuration and translations.
    pub fn snapshot(&self) -> DeviceList {
        let mut snapshots = Vec::new();
        for device in self.devices.devices() {
            let (Some(identity), Some(status)) = (device.identity(), device.status()) else {
                continue;
            };
            snapshots.push(DeviceSnapshot {
                serial: identity.serial.clone(),
                props: identity.props,
                listens: identity.listens,
                status: status.status,
                config: self.configs.get(&identity.serial).map(|c| c.config),
                translations: self.translations.get(&identity.serial),
            });
        }
        DeviceList { devices: snapshots }
    }
}
