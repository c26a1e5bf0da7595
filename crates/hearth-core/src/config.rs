//! Gateway configuration.
//!
//! Loaded from an optional JSON file with `HEARTH_`-prefixed environment
//! overrides layered on top (e.g. `HEARTH_MESH__LISTEN_PORT=5000`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

/// Server-wide settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSection {
    /// Identifier reported in ping replies, if this server has one.
    pub identifier: Option<String>,
}

/// Mesh transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshSection {
    /// Port the mesh TCP listener binds.
    pub listen_port: u16,
    /// Whether a new root connection forcibly replaces the current one.
    pub kill_on_connect: bool,
}

/// Raw TCP transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TcpSection {
    /// Port the raw TCP listener binds.
    pub listen_port: u16,
}

/// WebSocket transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WsSection {
    /// Host the WebSocket server binds.
    pub host: String,
    /// Port the WebSocket server binds.
    pub port: u16,
}

/// Store database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Complete gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HearthConfig {
    /// Server-wide settings.
    pub server: ServerSection,
    /// Mesh transport settings.
    pub mesh: MeshSection,
    /// Raw TCP transport settings.
    pub tcp: TcpSection,
    /// WebSocket transport settings.
    pub ws: WsSection,
    /// Store database settings.
    pub database: DatabaseSection,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            server: ServerSection { identifier: None },
            mesh: MeshSection {
                listen_port: 4650,
                kill_on_connect: false,
            },
            tcp: TcpSection { listen_port: 4651 },
            ws: WsSection {
                host: "0.0.0.0".into(),
                port: 4652,
            },
            database: DatabaseSection {
                path: PathBuf::from("hearth.db"),
            },
        }
    }
}

impl HearthConfig {
    /// Load configuration: defaults, then the JSON file if present, then
    /// `HEARTH_` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, GatewayError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        figment
            .merge(Env::prefixed("HEARTH_").split("__"))
            .extract()
            .map_err(|e| GatewayError::Config(Box::new(e)))
    }
}
