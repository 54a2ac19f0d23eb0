//! Connection factory.
//!
//! The factory holds the engine handle and the options every connection is
//! created with, and reports driver metadata.

use crate::connection::{ConnectionOptions, ExecutionBridge};
use crate::engine::SqlEngine;
use crate::error::Result;
use crate::r2dbc::IgniteConnection;
use std::str::FromStr;
use std::sync::Arc;

/// Factory for [`IgniteConnection`]s.
///
/// All connections created by one factory drive the same engine handle and
/// therefore share its session and transaction.
///
/// # Example
///
/// ```
/// use ignite_r2dbc::engine::memory::MemoryEngine;
/// use ignite_r2dbc::r2dbc::ConnectionFactory;
/// use std::sync::Arc;
///
/// let factory = ConnectionFactory::new(Arc::new(MemoryEngine::new()));
/// assert_eq!(factory.name(), "ignite-r2dbc");
/// let _connection = factory.create();
/// ```
#[derive(Clone)]
pub struct ConnectionFactory {
    engine: Arc<dyn SqlEngine>,
    options: ConnectionOptions,
    /// Driver name
    name: String,
    /// Driver version
    version: String,
}

impl ConnectionFactory {
    /// Create a factory with default options.
    pub fn new(engine: Arc<dyn SqlEngine>) -> Self {
        Self::with_options(engine, ConnectionOptions::default())
    }

    /// Create a factory with explicit options.
    pub fn with_options(engine: Arc<dyn SqlEngine>, options: ConnectionOptions) -> Self {
        Self {
            engine,
            options,
            name: "ignite-r2dbc".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Create a factory from an options string such as
    /// `r2dbc:ignite:?isolation=SERIALIZABLE`.
    pub fn from_options_str(engine: Arc<dyn SqlEngine>, options: &str) -> Result<Self> {
        let options = ConnectionOptions::from_str(options)?;
        Ok(Self::with_options(engine, options))
    }

    /// Get the driver name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the driver version.
    ///
    /// # Returns
    ///
    /// The version string from the Cargo.toml.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Options new connections are created with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Create a connection.
    pub fn create(&self) -> IgniteConnection {
        let bridge = ExecutionBridge::new(Arc::clone(&self.engine), &self.options);
        IgniteConnection::new(Arc::new(bridge), self.options.isolation_level.clone())
    }
}

impl std::fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("engine", &"<SqlEngine>")
            .field("options", &self.options)
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}
