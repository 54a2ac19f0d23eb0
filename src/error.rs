//! Error types for ignite-r2dbc.
//!
//! This module defines domain-specific error types organized by functional area.
//! Errors raised by the backing engine ([`NativeError`]) never leave the crate:
//! they are translated into [`EngineError`] at the boundary.

use crate::engine::NativeError;
use crate::spi::IsolationLevel;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the driver.
pub type Result<T, E = IgniteError> = std::result::Result<T, E>;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum IgniteError {
    /// Invalid input supplied by the caller
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Failure raised by the backing engine
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid connection configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Operation the driver does not implement
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    /// Waiting for a native completion took too long
    #[error("{operation} did not complete within {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
}

/// Errors caused by invalid caller input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    /// Parameter name does not carry a marker followed by an ordinal
    #[error("Identifier '{identifier}' is not a valid identifier. Should be of the pattern '?N' or '$N' with N >= 1")]
    InvalidIdentifier { identifier: String },

    /// Column index outside of the result shape
    #[error("Column index {index} is larger than the number of columns {count}")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    /// Column name not declared by the result
    #[error("Column name '{name}' does not exist in column names {available:?}")]
    UnknownColumn {
        name: String,
        available: Vec<String>,
    },

    /// Isolation level without a native equivalent
    #[error("Invalid isolation level {0}")]
    UnsupportedIsolationLevel(IsolationLevel),

    /// Value cannot be read as the requested type
    #[error("Cannot read column {column} of type {actual} as {expected}")]
    TypeMismatch {
        column: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

/// The engine operation during which a native failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
    /// Running a query
    Query,
    /// Reading the next record from a cursor
    Fetch,
    /// Starting a transaction
    Begin,
    /// Committing a transaction
    Commit,
    /// Rolling back a transaction
    Rollback,
    /// Closing the engine handle
    Close,
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineOperation::Query => write!(f, "query"),
            EngineOperation::Fetch => write!(f, "fetch"),
            EngineOperation::Begin => write!(f, "begin"),
            EngineOperation::Commit => write!(f, "commit"),
            EngineOperation::Rollback => write!(f, "rollback"),
            EngineOperation::Close => write!(f, "close"),
        }
    }
}

/// Translated engine failure.
///
/// Every native failure reaching the caller has this single shape, regardless of
/// what the engine raised.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Engine {operation} failed: {message}")]
pub struct EngineError {
    /// Operation that failed
    pub operation: EngineOperation,
    /// Native error code, if the engine supplied one
    pub code: Option<i32>,
    /// Human readable description
    pub message: String,
}

impl EngineError {
    /// Translate a native failure raised during `operation`.
    pub fn translate(operation: EngineOperation, native: NativeError) -> Self {
        Self {
            operation,
            code: native.code,
            message: native.message,
        }
    }

    /// Failure that did not originate from a native error value.
    pub fn other(operation: EngineOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: None,
            message: message.into(),
        }
    }
}

/// Errors in connection configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Options string could not be parsed
    #[error("Failed to parse connection options: {0}")]
    ParseError(String),

    /// Option value is invalid
    #[error("Invalid connection option '{option}': {message}")]
    InvalidOption { option: String, message: String },
}

/// R2DBC-style error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R2dbcErrorCode {
    /// Invalid argument
    InvalidArgument,
    /// Engine failure
    Engine,
    /// Not implemented
    NotImplemented,
    /// Timeout
    Timeout,
}

impl fmt::Display for R2dbcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            R2dbcErrorCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            R2dbcErrorCode::Engine => write!(f, "ENGINE"),
            R2dbcErrorCode::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
            R2dbcErrorCode::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

impl IgniteError {
    /// Map to an error category.
    pub fn error_code(&self) -> R2dbcErrorCode {
        match self {
            IgniteError::Argument(_) | IgniteError::Config(_) => R2dbcErrorCode::InvalidArgument,
            IgniteError::Engine(_) => R2dbcErrorCode::Engine,
            IgniteError::Unsupported { .. } => R2dbcErrorCode::NotImplemented,
            IgniteError::Timeout { .. } => R2dbcErrorCode::Timeout,
        }
    }

    /// Unsupported-operation error for `operation`.
    pub(crate) fn unsupported(operation: &'static str) -> Self {
        IgniteError::Unsupported { operation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identifier_display() {
        let err = ArgumentError::InvalidIdentifier {
            identifier: "name".to_string(),
        };
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_column_index_display() {
        let err = ArgumentError::ColumnIndexOutOfRange { index: 5, count: 2 };
        assert!(err.to_string().contains("index 5"));
        assert!(err.to_string().contains("columns 2"));
    }

    #[test]
    fn test_engine_error_translation() {
        let native = NativeError::with_code(1001, "table not found");
        let err = EngineError::translate(EngineOperation::Query, native);
        assert_eq!(err.code, Some(1001));
        assert_eq!(err.to_string(), "Engine query failed: table not found");
    }

    #[test]
    fn test_error_code_mapping() {
        let err = IgniteError::from(ArgumentError::ColumnIndexOutOfRange { index: 1, count: 0 });
        assert_eq!(err.error_code(), R2dbcErrorCode::InvalidArgument);

        let err = IgniteError::from(EngineError::other(EngineOperation::Commit, "boom"));
        assert_eq!(err.error_code(), R2dbcErrorCode::Engine);

        let err = IgniteError::unsupported("createSavepoint");
        assert_eq!(err.error_code(), R2dbcErrorCode::NotImplemented);

        let err = IgniteError::Timeout {
            operation: "commit",
            timeout_ms: 10,
        };
        assert_eq!(err.error_code(), R2dbcErrorCode::Timeout);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(R2dbcErrorCode::InvalidArgument.to_string(), "INVALID_ARGUMENT");
        assert_eq!(R2dbcErrorCode::NotImplemented.to_string(), "NOT_IMPLEMENTED");
    }

    #[test]
    fn test_unsupported_isolation_display() {
        let err = ArgumentError::UnsupportedIsolationLevel(IsolationLevel::Custom(
            "SNAPSHOT".to_string(),
        ));
        assert!(err.to_string().contains("SNAPSHOT"));
    }
}
