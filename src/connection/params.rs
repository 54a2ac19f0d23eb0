//! Connection option parsing and validation.
//!
//! Options can be built in code, parsed from an options string or
//! deserialized from a configuration file.

use crate::engine::TransactionConcurrency;
use crate::error::ConfigError;
use crate::spi::IsolationLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const URL_PREFIX: &str = "r2dbc:ignite:";

/// Options applied to every connection created by a factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Isolation level of transactions until changed on the connection
    pub isolation_level: IsolationLevel,

    /// Concurrency mode passed to the engine on begin
    pub concurrency: TransactionConcurrency,

    /// How long to wait for commit or rollback to complete, in milliseconds.
    /// `None` waits indefinitely.
    pub tx_timeout_ms: Option<u64>,
}

impl ConnectionOptions {
    /// Create a new ConnectionOptionsBuilder.
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new()
    }

    /// Completion timeout for commit and rollback.
    pub fn tx_timeout(&self) -> Option<Duration> {
        self.tx_timeout_ms.map(Duration::from_millis)
    }
}

impl FromStr for ConnectionOptions {
    type Err = ConfigError;

    /// Parse an options string in the format:
    /// `[r2dbc:ignite:][?]key=value[&key=value...]`
    ///
    /// Recognized keys are `isolation`, `concurrency` and `tx_timeout_ms`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ignite_r2dbc::connection::ConnectionOptions;
    /// # use ignite_r2dbc::spi::IsolationLevel;
    /// # use std::str::FromStr;
    /// let options = ConnectionOptions::from_str(
    ///     "r2dbc:ignite:?isolation=REPEATABLE_READ&concurrency=optimistic&tx_timeout_ms=5000",
    /// )?;
    /// assert_eq!(options.isolation_level, IsolationLevel::RepeatableRead);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let options = s.trim();
        let options = options.strip_prefix(URL_PREFIX).unwrap_or(options);
        let query = options.strip_prefix('?').unwrap_or(options);

        let params = parse_query_params(query)?;
        apply_query_params(ConnectionOptionsBuilder::new(), params)?.build()
    }
}

impl fmt::Display for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionOptions {{ isolation: {}, concurrency: {}, tx_timeout_ms: {:?} }}",
            self.isolation_level, self.concurrency, self.tx_timeout_ms
        )
    }
}

/// Builder for constructing ConnectionOptions with validation.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptionsBuilder {
    isolation_level: Option<IsolationLevel>,
    concurrency: Option<TransactionConcurrency>,
    tx_timeout: Option<Duration>,
}

impl ConnectionOptionsBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial isolation level.
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    /// Set the transaction concurrency mode.
    pub fn concurrency(mut self, concurrency: TransactionConcurrency) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set the commit/rollback completion timeout.
    pub fn tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = Some(timeout);
        self
    }

    /// Build the ConnectionOptions with validation.
    pub fn build(self) -> Result<ConnectionOptions, ConfigError> {
        let tx_timeout_ms = match self.tx_timeout {
            Some(timeout) if timeout.is_zero() => {
                return Err(ConfigError::InvalidOption {
                    option: "tx_timeout_ms".to_string(),
                    message: "Timeout must be greater than 0".to_string(),
                });
            }
            Some(timeout) => Some(u64::try_from(timeout.as_millis()).map_err(|_| {
                ConfigError::InvalidOption {
                    option: "tx_timeout_ms".to_string(),
                    message: "Timeout is too large".to_string(),
                }
            })?),
            None => None,
        };

        Ok(ConnectionOptions {
            isolation_level: self.isolation_level.unwrap_or_default(),
            concurrency: self.concurrency.unwrap_or_default(),
            tx_timeout_ms,
        })
    }
}

/// Parse `key=value` pairs separated by `&`.
fn parse_query_params(query: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut params = HashMap::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ConfigError::ParseError(format!("Invalid option format: {}", pair))
        })?;

        let key = urlencoding::decode(key)
            .map_err(|e| ConfigError::ParseError(format!("Failed to decode key: {}", e)))?
            .into_owned();
        let value = urlencoding::decode(value)
            .map_err(|e| ConfigError::ParseError(format!("Failed to decode value: {}", e)))?
            .into_owned();

        params.insert(key, value);
    }

    Ok(params)
}

/// Apply parsed options to builder.
fn apply_query_params(
    mut builder: ConnectionOptionsBuilder,
    params: HashMap<String, String>,
) -> Result<ConnectionOptionsBuilder, ConfigError> {
    for (key, value) in params {
        match key.as_str() {
            "isolation" | "isolation_level" => {
                let level = IsolationLevel::from_name(&value).ok_or_else(|| {
                    ConfigError::InvalidOption {
                        option: key.clone(),
                        message: format!("Unknown isolation level: {}", value),
                    }
                })?;
                builder = builder.isolation_level(level);
            }
            "concurrency" => {
                let concurrency = match value.to_ascii_uppercase().as_str() {
                    "PESSIMISTIC" => TransactionConcurrency::Pessimistic,
                    "OPTIMISTIC" => TransactionConcurrency::Optimistic,
                    _ => {
                        return Err(ConfigError::InvalidOption {
                            option: key.clone(),
                            message: format!("Unknown concurrency mode: {}", value),
                        })
                    }
                };
                builder = builder.concurrency(concurrency);
            }
            "tx_timeout_ms" => {
                let millis: u64 = value.parse().map_err(|_| ConfigError::InvalidOption {
                    option: key.clone(),
                    message: format!("Invalid timeout value: {}", value),
                })?;
                builder = builder.tx_timeout(Duration::from_millis(millis));
            }
            _ => {
                return Err(ConfigError::InvalidOption {
                    option: key.clone(),
                    message: "Unknown option".to_string(),
                });
            }
        }
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();

        assert_eq!(options.isolation_level, IsolationLevel::ReadUncommitted);
        assert_eq!(options.concurrency, TransactionConcurrency::Pessimistic);
        assert_eq!(options.tx_timeout(), None);
        assert_eq!(ConnectionOptions::builder().build().unwrap(), options);
    }

    #[test]
    fn test_builder_full() {
        let options = ConnectionOptions::builder()
            .isolation_level(IsolationLevel::Serializable)
            .concurrency(TransactionConcurrency::Optimistic)
            .tx_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(options.isolation_level, IsolationLevel::Serializable);
        assert_eq!(options.concurrency, TransactionConcurrency::Optimistic);
        assert_eq!(options.tx_timeout_ms, Some(2000));
        assert_eq!(options.tx_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = ConnectionOptions::builder()
            .tx_timeout(Duration::ZERO)
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidOption { option, .. } if option == "tx_timeout_ms"
        ));
    }

    #[test]
    fn test_parse_with_prefix() {
        let options = ConnectionOptions::from_str(
            "r2dbc:ignite:?isolation=read_committed&concurrency=OPTIMISTIC&tx_timeout_ms=250",
        )
        .unwrap();

        assert_eq!(options.isolation_level, IsolationLevel::ReadCommitted);
        assert_eq!(options.concurrency, TransactionConcurrency::Optimistic);
        assert_eq!(options.tx_timeout_ms, Some(250));
    }

    #[test]
    fn test_parse_without_prefix() {
        let options = ConnectionOptions::from_str("isolation=REPEATABLE%20READ").unwrap();
        assert_eq!(options.isolation_level, IsolationLevel::RepeatableRead);

        assert_eq!(
            ConnectionOptions::from_str("").unwrap(),
            ConnectionOptions::default()
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConnectionOptions::from_str("isolation").unwrap_err(),
            ConfigError::ParseError(_)
        ));
        assert!(matches!(
            ConnectionOptions::from_str("isolation=SNAPSHOT").unwrap_err(),
            ConfigError::InvalidOption { option, .. } if option == "isolation"
        ));
        assert!(matches!(
            ConnectionOptions::from_str("concurrency=EVENTUAL").unwrap_err(),
            ConfigError::InvalidOption { .. }
        ));
        assert!(matches!(
            ConnectionOptions::from_str("tx_timeout_ms=soon").unwrap_err(),
            ConfigError::InvalidOption { .. }
        ));
        assert!(matches!(
            ConnectionOptions::from_str("host=localhost").unwrap_err(),
            ConfigError::InvalidOption { option, .. } if option == "host"
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: ConnectionOptions =
            serde_json::from_str(r#"{ "concurrency": "OPTIMISTIC" }"#).unwrap();

        assert_eq!(options.concurrency, TransactionConcurrency::Optimistic);
        assert_eq!(options.isolation_level, IsolationLevel::ReadUncommitted);
        assert_eq!(options.tx_timeout_ms, None);
    }

    #[test]
    fn test_display() {
        let display = ConnectionOptions::default().to_string();
        assert!(display.contains("READ UNCOMMITTED"));
        assert!(display.contains("PESSIMISTIC"));
    }
}
