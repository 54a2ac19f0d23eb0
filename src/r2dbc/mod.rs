//! Reactive connection layer.
//!
//! A [`ConnectionFactory`] creates [`IgniteConnection`]s. Connections hand
//! out statements and batches and control transactions.

mod connection;
mod factory;

pub use connection::IgniteConnection;
pub use factory::ConnectionFactory;
