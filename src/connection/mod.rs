//! Connection options and the engine execution bridge.
//!
//! # Example
//!
//! ```
//! # use ignite_r2dbc::connection::{ConnectionOptions, ConnectionOptionsBuilder};
//! # use ignite_r2dbc::engine::TransactionConcurrency;
//! # use std::str::FromStr;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Using ConnectionOptionsBuilder
//! let options = ConnectionOptionsBuilder::new()
//!     .concurrency(TransactionConcurrency::Optimistic)
//!     .tx_timeout(std::time::Duration::from_secs(10))
//!     .build()?;
//!
//! // Or parse from an options string
//! let options = ConnectionOptions::from_str(
//!     "r2dbc:ignite:?isolation=SERIALIZABLE&tx_timeout_ms=10000"
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod params;

pub use bridge::{native_isolation, ExecutionBridge};
pub use params::{ConnectionOptions, ConnectionOptionsBuilder};
