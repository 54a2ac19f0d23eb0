//! Engine layer.
//!
//! The driver never talks to storage directly. It drives an implementation of
//! [`SqlEngine`] and consumes the [`NativeCursor`]s it returns.
//! [`memory::MemoryEngine`] is an in-process implementation.

pub mod memory;
pub mod protocol;

pub use protocol::{
    CompletionCallback, FieldMeta, GeneratedKeys, NativeCursor, NativeError, NativeQuery,
    ProductInfo, SqlEngine, TransactionConcurrency, TransactionInfo, TransactionIsolation,
};
