//! Error hierarchy for the hearth gateway.
//!
//! Almost nothing in the gateway core surfaces errors: transport faults
//! degrade to logged no-ops and undecodable frames are dropped silently.
//! The types here cover what remains — startup failures (listener bind,
//! store open) and store plumbing.

use std::path::PathBuf;

use thiserror::Error;

/// Transport-layer error. Only `Bind` is fatal; everything else is logged
/// and absorbed at the channel boundary.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A transport listener could not be bound at startup.
    #[error("failed to bind {transport} listener on {addr}")]
    Bind {
        /// Transport kind ("mesh", "tcp", "websocket").
        transport: &'static str,
        /// Address that could not be bound.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ChannelError {
    /// Wrap a bind failure for the given transport and address.
    pub fn bind(transport: &'static str, addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            transport,
            addr: addr.into(),
            source,
        }
    }
}

/// Persistence error from the SQLite-backed stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or migrated.
    #[error("failed to open store database at {path}")]
    Open {
        /// Database path.
        path: PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
    /// A query failed.
    #[error("store query failed")]
    Query(#[from] rusqlite::Error),
}

/// Top-level gateway error, used at startup wiring only.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport startup failure.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Store startup failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration could not be loaded.
    #[error("failed to load configuration")]
    Config(#[from] Box<figment::Error>),
}
