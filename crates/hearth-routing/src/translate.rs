//! Translation sync: persist user-submitted device translations. Nothing
//! is pushed back to devices.

use std::sync::Arc;

use hearth_core::protocol::DeviceTranslation;
use hearth_core::stores::TranslationStore;
use hearth_sessions::{DeviceManager, User, UserManager, UserObserver};
use tracing::{debug, warn};

use crate::Router;

/// Persists device translations submitted by users.
pub struct TranslateRouter {
    translations: Arc<dyn TranslationStore>,
}

impl TranslateRouter {
    /// Router name.
    pub const NAME: &'static str = "translate";

    /// Build the router.
    pub fn new(translations: Arc<dyn TranslationStore>) -> Arc<Self> {
        Arc::new(Self { translations })
    }
}

impl Router for TranslateRouter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self: Arc<Self>, _devices: &DeviceManager, users: &UserManager) {
        users.register_observer(self);
    }
}

impl UserObserver for TranslateRouter {
    fn translation_submitted(&self, _user: &Arc<User>, translation: &DeviceTranslation) {
        if self.translations.save(&translation.serial, translation) {
            debug!(serial = translation.serial, "translation persisted");
        } else {
            warn!(serial = translation.serial, "translation could not be persisted");
        }
    }
}
