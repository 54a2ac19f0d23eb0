//! Backing engine abstraction.
//!
//! This module defines the `SqlEngine` trait the driver drives, and the
//! `NativeCursor` trait for the server-side cursors it hands back. The engine
//! API is synchronous: `query` and `tx_start` block the calling thread, while
//! commit and rollback report completion through a callback.

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error raised by an engine implementation.
///
/// Only engines produce this type. The driver translates it into
/// [`crate::error::EngineError`] before it reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NativeError {
    /// Engine specific error code
    pub code: Option<i32>,
    /// Description
    pub message: String,
}

impl NativeError {
    /// Create an error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create an error with an engine code.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Native transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionIsolation {
    /// Read committed
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

/// Native transaction concurrency modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionConcurrency {
    /// Locks are acquired eagerly
    #[default]
    Pessimistic,
    /// Conflicts are detected at commit
    Optimistic,
}

impl fmt::Display for TransactionConcurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionConcurrency::Pessimistic => write!(f, "PESSIMISTIC"),
            TransactionConcurrency::Optimistic => write!(f, "OPTIMISTIC"),
        }
    }
}

/// Snapshot of the transaction bound to the engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Engine assigned transaction id
    pub id: u64,
    /// Isolation the transaction was started with
    pub isolation: TransactionIsolation,
    /// Concurrency the transaction was started with
    pub concurrency: TransactionConcurrency,
}

/// Which generated values a statement asked the engine to return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeneratedKeys {
    /// Nothing requested
    #[default]
    None,
    /// All generated columns
    All,
    /// The named columns
    Columns(Vec<String>),
}

/// One native query execution request.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    /// SQL text of a single statement
    pub sql: String,
    /// Arguments in placeholder order
    pub args: Vec<Value>,
    /// Generated-values hint
    pub generated_keys: GeneratedKeys,
}

impl NativeQuery {
    /// Create a query without arguments.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
            generated_keys: GeneratedKeys::None,
        }
    }

    /// Set the arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set the generated-values hint.
    pub fn with_generated_keys(mut self, generated_keys: GeneratedKeys) -> Self {
        self.generated_keys = generated_keys;
        self
    }
}

impl fmt::Display for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeQuery {{ sql: {}, args: [", self.sql)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, "] }}")
    }
}

/// Field metadata reported by a query-shaped cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    /// Column label
    pub name: String,
    /// Declared SQL type name
    pub type_name: String,
    /// Numeric precision or character length
    pub precision: i32,
    /// Numeric scale
    pub scale: i32,
    /// Nullability code (0 = no nulls, 1 = nullable, 2 = unknown)
    pub nullability: i32,
}

impl FieldMeta {
    /// Create field metadata with unknown nullability and no precision.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            precision: 0,
            scale: 0,
            nullability: crate::types::Nullability::NULLABLE_UNKNOWN,
        }
    }

    /// Set precision and scale.
    pub fn with_precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Set the nullability code.
    pub fn with_nullability(mut self, nullability: i32) -> Self {
        self.nullability = nullability;
        self
    }
}

/// Server-side cursor returned by one native execution.
pub trait NativeCursor: Send {
    /// Whether the execution produced a result set (as opposed to an update count).
    fn is_query(&self) -> bool;

    /// Field metadata. Empty for update-shaped cursors.
    fn fields(&self) -> &[FieldMeta];

    /// Advance to the next record. `None` means the cursor is exhausted.
    fn next_record(&mut self) -> Option<Result<Vec<Value>, NativeError>>;

    /// Release server-side resources.
    fn close(&mut self);
}

/// Callback fired exactly once when an asynchronous native operation completes.
pub type CompletionCallback = Box<dyn FnOnce(Result<(), NativeError>) + Send + 'static>;

/// Engine product information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    /// Product name
    pub name: String,
    /// Product version
    pub version: String,
}

/// Backing SQL engine.
///
/// One engine handle represents one session: the current transaction is tied to
/// it, not to any statement.
pub trait SqlEngine: Send + Sync {
    /// Run one statement. Blocks until the engine has produced a cursor.
    fn query(&self, query: &NativeQuery) -> Result<Box<dyn NativeCursor>, NativeError>;

    /// Start a transaction. Blocks.
    fn tx_start(
        &self,
        concurrency: TransactionConcurrency,
        isolation: TransactionIsolation,
    ) -> Result<(), NativeError>;

    /// Commit the current transaction; `on_complete` fires once when done.
    fn tx_commit(&self, on_complete: CompletionCallback);

    /// Roll back the current transaction; `on_complete` fires once when done.
    fn tx_rollback(&self, on_complete: CompletionCallback);

    /// The transaction in progress, if any.
    fn current_transaction(&self) -> Option<TransactionInfo>;

    /// Product name and version.
    fn product_info(&self) -> ProductInfo;

    /// Close the session.
    fn close(&self) -> Result<(), NativeError>;
}
