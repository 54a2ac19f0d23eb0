//! Connection implementation.
//!
//! `IgniteConnection` implements [`spi::Connection`](crate::spi::Connection)
//! on top of an [`ExecutionBridge`].

use crate::connection::ExecutionBridge;
use crate::error::{IgniteError, Result};
use crate::query::{Batch, Statement};
use crate::spi::{self, ConnectionMetadata, IsolationLevel, ValidationDepth};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A connection to the engine.
///
/// Transactions are explicit: the connection never auto-commits.
///
/// # Example
///
/// ```
/// use ignite_r2dbc::engine::memory::MemoryEngine;
/// use ignite_r2dbc::r2dbc::ConnectionFactory;
/// use ignite_r2dbc::spi::Connection;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ignite_r2dbc::Result<()> {
/// let connection = ConnectionFactory::new(Arc::new(MemoryEngine::new())).create();
///
/// connection.begin_transaction().await?;
/// // ... statements ...
/// connection.commit_transaction().await?;
///
/// connection.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct IgniteConnection {
    /// Engine session
    bridge: Arc<ExecutionBridge>,
    /// Level used by the next begin
    isolation_level: RwLock<IsolationLevel>,
    /// Set once `close` has run
    closed: AtomicBool,
}

impl IgniteConnection {
    pub(crate) fn new(bridge: Arc<ExecutionBridge>, isolation_level: IsolationLevel) -> Self {
        Self {
            bridge,
            isolation_level: RwLock::new(isolation_level),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether a transaction is in progress.
    pub fn in_transaction(&self) -> bool {
        self.bridge.in_transaction()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl spi::Connection for IgniteConnection {
    type Statement = Statement;
    type Batch = Batch;

    async fn begin_transaction(&self) -> Result<()> {
        let level = self.isolation_level.read().await.clone();
        self.bridge.begin_transaction(&level).await
    }

    async fn commit_transaction(&self) -> Result<()> {
        self.bridge.commit().await
    }

    async fn rollback_transaction(&self) -> Result<()> {
        self.bridge.rollback().await
    }

    async fn set_transaction_isolation_level(&self, level: IsolationLevel) -> Result<()> {
        debug!(%level, "Isolation level set");
        *self.isolation_level.write().await = level;
        Ok(())
    }

    async fn transaction_isolation_level(&self) -> IsolationLevel {
        self.isolation_level.read().await.clone()
    }

    fn create_statement(&self, sql: &str) -> Statement {
        Statement::new(Arc::clone(&self.bridge), sql)
    }

    fn create_batch(&self) -> Batch {
        Batch::new(Arc::clone(&self.bridge))
    }

    fn is_auto_commit(&self) -> bool {
        false
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        debug!(auto_commit, "Auto-commit is not supported, request ignored");
        Ok(())
    }

    fn metadata(&self) -> ConnectionMetadata {
        let info = self.bridge.product_info();
        ConnectionMetadata {
            database_product_name: info.name,
            database_version: info.version,
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.bridge.close()
    }

    fn create_savepoint(&self, _name: &str) -> Result<()> {
        Err(IgniteError::unsupported("create_savepoint"))
    }

    fn release_savepoint(&self, _name: &str) -> Result<()> {
        Err(IgniteError::unsupported("release_savepoint"))
    }

    fn rollback_transaction_to_savepoint(&self, _name: &str) -> Result<()> {
        Err(IgniteError::unsupported("rollback_transaction_to_savepoint"))
    }

    fn validate(&self, _depth: ValidationDepth) -> Result<bool> {
        Err(IgniteError::unsupported("validate"))
    }
}
