//! Indexer configuration read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::dispatcher::DEFAULT_MAX_ENTRY_RETRIES;
use crate::IndexingError;
use catalog_indexer_repository::opensearch::DEFAULT_INDEX_NAME;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "catalog-indexer";

/// Default index queue topic.
const DEFAULT_QUEUE_TOPIC: &str = "catalog-index-queue";

/// Default lookback window in seconds.
const DEFAULT_LOOKBACK_SECS: u64 = 3600;

const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_DATABASE_TIMEOUT_SECS: u64 = 30;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection at a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Timeouts for each external client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// OpenSearch transport timeout.
    pub search: Duration,
    /// Kafka delivery timeout.
    pub queue: Duration,
    /// PostgreSQL connection acquire timeout.
    pub database: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            search: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            queue: Duration::from_millis(DEFAULT_QUEUE_TIMEOUT_MS),
            database: Duration::from_secs(DEFAULT_DATABASE_TIMEOUT_SECS),
        }
    }
}

/// Configuration shared by both stages.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Topic index messages are produced to and consumed from.
    pub queue_topic: String,
    /// Name of the search index.
    pub index_name: String,
    /// How far back a change-detection run looks.
    pub lookback: Duration,
    pub client_timeouts: ClientTimeouts,
    pub opensearch_url: String,
    pub kafka_broker: String,
    pub kafka_group_id: String,
    /// SASL credentials for managed Kafka.
    pub kafka_credentials: Option<(String, String)>,
    pub database_url: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    /// Extra attempts for an entry the queue reported as failed.
    pub max_entry_retries: u32,
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_QUEUE`: Index queue topic (default: catalog-index-queue)
    /// - `ES_INDEX`: Search index name (default: sfr_works)
    /// - `INDEX_PERIOD`: Lookback window in seconds (default: 3600)
    /// - `ES_TIMEOUT`: OpenSearch timeout in seconds (default: 30)
    /// - `KAFKA_TIMEOUT_MS`: Kafka delivery timeout in milliseconds (default: 5000)
    /// - `DB_TIMEOUT`: Database acquire timeout in seconds (default: 30)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: catalog-indexer)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD`: Enable SASL/SSL when both are set
    /// - `DATABASE_URL`: PostgreSQL connection string (required)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `DISPATCH_MAX_ENTRY_RETRIES`: Retries per failed queue entry (default: 2)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| IndexingError::config("DATABASE_URL must be set"))?;

        let kafka_credentials = match (lookup("KAFKA_USERNAME"), lookup("KAFKA_PASSWORD")) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        };

        let client_timeouts = ClientTimeouts {
            search: Duration::from_secs(parse_or(
                &lookup,
                "ES_TIMEOUT",
                DEFAULT_SEARCH_TIMEOUT_SECS,
            )),
            queue: Duration::from_millis(parse_or(
                &lookup,
                "KAFKA_TIMEOUT_MS",
                DEFAULT_QUEUE_TIMEOUT_MS,
            )),
            database: Duration::from_secs(parse_or(
                &lookup,
                "DB_TIMEOUT",
                DEFAULT_DATABASE_TIMEOUT_SECS,
            )),
        };

        Ok(Self {
            queue_topic: string_or("INDEX_QUEUE", DEFAULT_QUEUE_TOPIC),
            index_name: string_or("ES_INDEX", DEFAULT_INDEX_NAME),
            lookback: Duration::from_secs(parse_or(&lookup, "INDEX_PERIOD", DEFAULT_LOOKBACK_SECS)),
            client_timeouts,
            opensearch_url: string_or("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            kafka_broker: string_or("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            kafka_group_id: string_or("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            kafka_credentials,
            database_url,
            connection_mode: ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE").as_deref()),
            retry_interval: Duration::from_secs(parse_or(
                &lookup,
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
            max_entry_retries: parse_or(
                &lookup,
                "DISPATCH_MAX_ENTRY_RETRIES",
                DEFAULT_MAX_ENTRY_RETRIES,
            ),
        })
    }
}

/// Parse a numeric variable, falling back to `default` when it is unset or invalid.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    variable = key,
                    value = %raw,
                    default = %default,
                    "Invalid numeric value, using default"
                );
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<IndexerConfig, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IndexerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/catalog")]).unwrap();

        assert_eq!(config.queue_topic, "catalog-index-queue");
        assert_eq!(config.index_name, "sfr_works");
        assert_eq!(config.lookback, Duration::from_secs(3600));
        assert_eq!(config.client_timeouts, ClientTimeouts::default());
        assert_eq!(config.connection_mode, ConnectionMode::Retry);
        assert_eq!(config.max_entry_retries, 2);
        assert!(config.kafka_credentials.is_none());
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let result = config_from(&[]);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/catalog"),
            ("INDEX_QUEUE", "works-to-index"),
            ("ES_INDEX", "works_v2"),
            ("INDEX_PERIOD", "900"),
            ("ES_TIMEOUT", "5"),
            ("KAFKA_TIMEOUT_MS", "250"),
            ("OPENSEARCH_CONNECTION_MODE", "Fail-Fast"),
            ("KAFKA_USERNAME", "indexer"),
            ("KAFKA_PASSWORD", "secret"),
        ])
        .unwrap();

        assert_eq!(config.queue_topic, "works-to-index");
        assert_eq!(config.index_name, "works_v2");
        assert_eq!(config.lookback, Duration::from_secs(900));
        assert_eq!(config.client_timeouts.search, Duration::from_secs(5));
        assert_eq!(config.client_timeouts.queue, Duration::from_millis(250));
        assert_eq!(config.connection_mode, ConnectionMode::FailFast);
        assert_eq!(
            config.kafka_credentials,
            Some(("indexer".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/catalog"),
            ("INDEX_PERIOD", "an hour"),
            ("DB_TIMEOUT", "-1"),
        ])
        .unwrap();

        assert_eq!(config.lookback, Duration::from_secs(3600));
        assert_eq!(config.client_timeouts.database, Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_connection_mode_defaults_to_retry() {
        assert_eq!(ConnectionMode::parse(Some("sometimes")), ConnectionMode::Retry);
        assert_eq!(ConnectionMode::parse(None), ConnectionMode::Retry);
    }
}
