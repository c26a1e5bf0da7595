//! Gateway core: constructs and owns everything with a process lifetime.

use std::sync::Arc;

use hearth_channels::{
    MemoryChannelManager, MeshChannelManager, TcpChannelManager, WsChannelManager,
};
use hearth_core::config::HearthConfig;
use hearth_core::errors::GatewayError;
use hearth_core::stores::{
    AccessStore, CloudBridge, ConfigStore, LoggingCloudBridge, SqliteStore, TranslationStore,
};
use hearth_routing::{
    ConfigRouter, DevicesDataService, EventRouter, RequestRouter, Router, StatusRouter,
    TranslateRouter, UpdateRouter,
};
use hearth_sessions::{DeviceManager, UserManager};
use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Default)]
struct Transports {
    mesh: Option<Arc<MeshChannelManager>>,
    tcp: Option<Arc<TcpChannelManager>>,
    ws: Option<Arc<WsChannelManager>>,
    memory: Option<Arc<MemoryChannelManager>>,
}

/// The assembled gateway. Managers, stores, and routers are constructed
/// once and passed by reference; nothing in the core is a global.
pub struct HearthCore {
    config: HearthConfig,
    devices: Arc<DeviceManager>,
    users: Arc<UserManager>,
    configs: Arc<dyn ConfigStore>,
    translations: Arc<dyn TranslationStore>,
    cloud: Arc<dyn CloudBridge>,
    router_names: Mutex<Vec<&'static str>>,
    transports: Mutex<Transports>,
}

impl HearthCore {
    /// Assemble a core around explicit store implementations.
    pub fn new(
        config: HearthConfig,
        access: Arc<dyn AccessStore>,
        configs: Arc<dyn ConfigStore>,
        translations: Arc<dyn TranslationStore>,
        cloud: Arc<dyn CloudBridge>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            devices: DeviceManager::new(),
            users: UserManager::new(access),
            configs,
            translations,
            cloud,
            router_names: Mutex::new(Vec::new()),
            transports: Mutex::new(Transports::default()),
        })
    }

    /// Assemble a core backed by the SQLite store from the configuration.
    pub fn with_sqlite(config: HearthConfig) -> Result<Arc<Self>, GatewayError> {
        let store = Arc::new(SqliteStore::open(&config.database.path)?);
        Ok(Self::new(
            config,
            Arc::clone(&store) as Arc<dyn AccessStore>,
            Arc::clone(&store) as Arc<dyn ConfigStore>,
            store as Arc<dyn TranslationStore>,
            Arc::new(LoggingCloudBridge),
        ))
    }

    /// The configuration this core runs with.
    pub fn config(&self) -> &HearthConfig {
        &self.config
    }

    /// The device session manager.
    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    /// The user session manager.
    pub fn users(&self) -> &Arc<UserManager> {
        &self.users
    }

    /// Register a router. Idempotent per router name: a repeat registration
    /// is a warned no-op.
    pub fn add_router(&self, router: Arc<dyn Router>) {
        {
            let mut names = self.router_names.lock();
            if names.contains(&router.name()) {
                warn!(router = router.name(), "router already registered, ignoring");
                return;
            }
            names.push(router.name());
        }
        info!(router = router.name(), "router registered");
        router.register(&self.devices, &self.users);
    }

    /// Whether a router with this name is registered.
    pub fn has_router(&self, name: &str) -> bool {
        self.router_names.lock().contains(&name)
    }

    /// Register the full standard router set.
    pub fn install_default_routers(&self) {
        self.add_router(StatusRouter::new(Arc::clone(&self.users)));
        self.add_router(EventRouter::new(
            Arc::clone(&self.devices),
            Arc::clone(&self.cloud),
        ));
        self.add_router(ConfigRouter::new(
            Arc::clone(&self.devices),
            Arc::clone(&self.configs),
        ));
        self.add_router(TranslateRouter::new(Arc::clone(&self.translations)));
        self.add_router(UpdateRouter::new(Arc::clone(&self.devices)));
        self.add_router(RequestRouter::new(
            DevicesDataService::new(
                Arc::clone(&self.devices),
                Arc::clone(&self.configs),
                Arc::clone(&self.translations),
            ),
            self.config.server.identifier.clone(),
        ));
    }

    /// Start every transport listener and wire it to its session manager.
    /// Listener bind failure is fatal; everything after startup is not.
    pub async fn start_transports(&self) -> Result<(), GatewayError> {
        let mesh = MeshChannelManager::start(&self.config.mesh).await?;
        self.devices.register_channel_manager(mesh.as_ref());

        let tcp = TcpChannelManager::start(&self.config.tcp).await?;
        self.devices.register_channel_manager(tcp.as_ref());

        let memory = MemoryChannelManager::new();
        self.devices.register_channel_manager(memory.as_ref());

        let ws = WsChannelManager::start(&self.config.ws).await?;
        self.users.register_channel_manager(ws.as_ref());

        let mut transports = self.transports.lock();
        transports.mesh = Some(mesh);
        transports.tcp = Some(tcp);
        transports.ws = Some(ws);
        transports.memory = Some(memory);
        Ok(())
    }

    /// The mesh transport, once started.
    pub fn mesh(&self) -> Option<Arc<MeshChannelManager>> {
        self.transports.lock().mesh.clone()
    }

    /// The raw TCP transport, once started.
    pub fn tcp(&self) -> Option<Arc<TcpChannelManager>> {
        self.transports.lock().tcp.clone()
    }

    /// The WebSocket transport, once started.
    pub fn ws(&self) -> Option<Arc<WsChannelManager>> {
        self.transports.lock().ws.clone()
    }

    /// The loop-back transport, once started.
    pub fn memory(&self) -> Option<Arc<MemoryChannelManager>> {
        self.transports.lock().memory.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::stores::{
        MemoryAccessStore, MemoryConfigStore, MemoryTranslationStore,
    };

    fn core() -> Arc<HearthCore> {
        HearthCore::new(
            HearthConfig::default(),
            Arc::new(MemoryAccessStore::new()),
            Arc::new(MemoryConfigStore::new()),
            Arc::new(MemoryTranslationStore::new()),
            Arc::new(LoggingCloudBridge),
        )
    }

    #[test]
    fn default_routers_install_once() {
        let core = core();
        core.install_default_routers();
        for name in ["status", "event", "config", "translate", "update", "request"] {
            assert!(core.has_router(name), "missing router {name}");
        }
    }

    #[test]
    fn repeat_router_registration_is_noop() {
        let core = core();
        core.add_router(StatusRouter::new(Arc::clone(core.users())));
        core.add_router(StatusRouter::new(Arc::clone(core.users())));
        assert!(core.has_router("status"));
        // Only the first registration subscribed; reinstalling everything
        // afterwards keeps each name unique.
        core.install_default_routers();
        assert_eq!(
            core.router_names.lock().len(),
            6,
            "router set should be deduplicated"
        );
    }

    #[tokio::test]
    async fn transports_start_on_ephemeral_ports() {
        let mut config = HearthConfig::default();
        config.mesh.listen_port = 0;
        config.tcp.listen_port = 0;
        config.ws.port = 0;
        config.ws.host = "127.0.0.1".into();

        let core = HearthCore::new(
            config,
            Arc::new(MemoryAccessStore::new()),
            Arc::new(MemoryConfigStore::new()),
            Arc::new(MemoryTranslationStore::new()),
            Arc::new(LoggingCloudBridge),
        );
        core.start_transports().await.unwrap();

        assert!(core.mesh().is_some());
        assert!(core.tcp().is_some());
        assert!(core.ws().is_some());
        assert!(core.memory().is_some());
        assert!(core.devices().has_channel_manager("mesh"));
        assert!(core.devices().has_channel_manager("tcp"));
        assert!(core.devices().has_channel_manager("memory"));
        assert!(core.users().has_channel_manager("websocket"));
    }
}
