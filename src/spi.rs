//! Service provider interface.
//!
//! Engine-agnostic connection contract and the value types it exchanges. The
//! crate's own implementation is [`crate::r2dbc::IgniteConnection`].

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction isolation level requested by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// READ UNCOMMITTED
    #[default]
    ReadUncommitted,
    /// READ COMMITTED
    ReadCommitted,
    /// REPEATABLE READ
    RepeatableRead,
    /// SERIALIZABLE
    Serializable,
    /// Vendor specific level, identified by its SQL name
    Custom(String),
}

impl IsolationLevel {
    /// Parse one of the four standard level names.
    ///
    /// Accepts `READ_COMMITTED`, `read committed`, `Read-Committed` and so on.
    /// Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '-' => ' ',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match normalized.as_str() {
            "READ UNCOMMITTED" => Some(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" => Some(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" => Some(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Some(IsolationLevel::Serializable),
            _ => None,
        }
    }

    /// SQL name of the level.
    pub fn as_sql(&self) -> &str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Custom(name) => name,
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// How thoroughly a connection should be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDepth {
    /// Client-side state only
    Local,
    /// Round trip to the server
    Remote,
}

/// Information about the database behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    /// Product name reported by the engine
    pub database_product_name: String,
    /// Product version reported by the engine
    pub database_version: String,
}

/// An application-facing database connection.
///
/// Transaction control and teardown are asynchronous. Statement creation,
/// savepoints and validation are synchronous.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Statement type created by this connection.
    type Statement;
    /// Batch type created by this connection.
    type Batch;

    /// Begin a transaction with the current isolation level.
    async fn begin_transaction(&self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit_transaction(&self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback_transaction(&self) -> Result<()>;

    /// Set the isolation level used by subsequent transactions.
    async fn set_transaction_isolation_level(&self, level: IsolationLevel) -> Result<()>;

    /// The isolation level used by subsequent transactions.
    async fn transaction_isolation_level(&self) -> IsolationLevel;

    /// Create a statement for `sql`.
    fn create_statement(&self, sql: &str) -> Self::Statement;

    /// Create an empty batch.
    fn create_batch(&self) -> Self::Batch;

    /// Whether the connection is in auto-commit mode.
    fn is_auto_commit(&self) -> bool;

    /// Change the auto-commit mode.
    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    /// Database metadata.
    fn metadata(&self) -> ConnectionMetadata;

    /// Release the connection.
    async fn close(&self) -> Result<()>;

    /// Create a savepoint in the current transaction.
    fn create_savepoint(&self, name: &str) -> Result<()>;

    /// Release a savepoint.
    fn release_savepoint(&self, name: &str) -> Result<()>;

    /// Roll back to a savepoint.
    fn rollback_transaction_to_savepoint(&self, name: &str) -> Result<()>;

    /// Check that the connection is usable.
    fn validate(&self, depth: ValidationDepth) -> Result<bool>;
}
