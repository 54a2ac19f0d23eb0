//! # ignite-r2dbc
//!
//! Reactive SQL driver for Apache Ignite style engines.
//!
//! This library turns SQL text and bound parameters into executions against a
//! [`SqlEngine`](engine::SqlEngine) and exposes every outcome as an item of an
//! asynchronous stream: either an update count or a lazily fetched stream of
//! rows with column metadata. Connections control explicit transactions on
//! the engine session.
//!
//! ## Example
//!
//! ```
//! use futures_util::StreamExt;
//! use ignite_r2dbc::engine::memory::MemoryEngine;
//! use ignite_r2dbc::spi::Connection;
//! use ignite_r2dbc::ConnectionFactory;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ignite_r2dbc::Result<()> {
//! let factory = ConnectionFactory::new(Arc::new(MemoryEngine::new()));
//! let connection = factory.create();
//!
//! let mut batch = connection.create_batch();
//! batch
//!     .add("CREATE TABLE CITY (ID INT PRIMARY KEY, NAME VARCHAR)")
//!     .add("INSERT INTO CITY VALUES (1, 'Forest Hill')");
//! let mut results = batch.execute();
//! while let Some(result) = results.next().await {
//!     result?;
//! }
//!
//! let mut statement = connection.create_statement("SELECT NAME FROM CITY WHERE ID = ?");
//! statement.bind(0usize, 1)?;
//!
//! let mut results = statement.execute();
//! while let Some(result) = results.next().await {
//!     let mut rows = result?.map_rows(|row, _| row.get_by_name::<String>("name"));
//!     while let Some(name) = rows.next().await {
//!         println!("{}", name??);
//!     }
//! }
//!
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod engine;
pub mod error;
pub mod query;
pub mod r2dbc;
pub mod spi;
pub mod types;

// Re-export public API
pub use error::{ArgumentError, ConfigError, EngineError, IgniteError, R2dbcErrorCode, Result};
pub use query::{Batch, QueryResult, ResultStream, Row, RowMetadata, RowStream, Statement};
pub use r2dbc::{ConnectionFactory, IgniteConnection};
pub use spi::IsolationLevel;
pub use types::{FromValue, Value, ValueType};
