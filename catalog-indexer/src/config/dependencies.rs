//! Dependency initialization and wiring for both stages.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::settings::{ConnectionMode, IndexerConfig};
use crate::consumer::KafkaConsumer;
use crate::dispatcher::{BatchDispatcher, KafkaQueue};
use crate::enumerator::ChangeEnumerator;
use crate::loader::IndexWriter;
use crate::orchestrator::Orchestrator;
use crate::poller::ChangePoller;
use crate::IndexingError;
use catalog_indexer_repository::{
    IndexConfig, OpenSearchProvider, PostgresWorkStore, SearchIndexProvider,
};

/// Container for the initialized indexing stage.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize the indexing stage.
    ///
    /// Connects to OpenSearch (creating the index when absent), the catalog
    /// database, and the Kafka consumer group.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (OpenSearch only in fail-fast mode)
    pub async fn new(config: &IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index = %config.index_name,
            kafka_broker = %config.kafka_broker,
            kafka_group_id = %config.kafka_group_id,
            topic = %config.queue_topic,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing indexing stage"
        );

        let search_provider = connect_to_opensearch(config).await?;
        info!("OpenSearch connection established");

        let work_store = connect_to_database(config).await?;
        info!("Catalog database pool created");

        let consumer = KafkaConsumer::new(
            &config.kafka_broker,
            &config.kafka_group_id,
            &config.queue_topic,
            kafka_credentials(config),
        )
        .map_err(|e| IndexingError::config(format!("Failed to create Kafka consumer: {}", e)))?;

        info!("Kafka consumer created");

        let writer = IndexWriter::new(Arc::new(work_store), Arc::new(search_provider));
        let orchestrator = Orchestrator::new(Arc::new(consumer), writer);

        Ok(Self { orchestrator })
    }
}

/// Container for the initialized change-detection stage.
pub struct PollerDependencies {
    /// The configured poller ready to run.
    pub poller: ChangePoller,
}

impl PollerDependencies {
    /// Initialize the change-detection stage.
    pub async fn new(config: &IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            kafka_broker = %config.kafka_broker,
            topic = %config.queue_topic,
            lookback_secs = config.lookback.as_secs(),
            "Initializing change-detection stage"
        );

        let work_store = connect_to_database(config).await?;

        let queue = KafkaQueue::new(
            &config.kafka_broker,
            &config.queue_topic,
            kafka_credentials(config),
            config.client_timeouts.queue,
        )
        .map_err(|e| IndexingError::config(format!("Failed to create Kafka producer: {}", e)))?;

        let enumerator = ChangeEnumerator::new(Arc::new(work_store));
        let dispatcher = BatchDispatcher::with_retries(Arc::new(queue), config.max_entry_retries);

        Ok(Self {
            poller: ChangePoller::new(enumerator, dispatcher, config.lookback),
        })
    }
}

fn kafka_credentials(config: &IndexerConfig) -> Option<(&str, &str)> {
    config
        .kafka_credentials
        .as_ref()
        .map(|(username, password)| (username.as_str(), password.as_str()))
}

async fn connect_to_database(config: &IndexerConfig) -> Result<PostgresWorkStore, IndexingError> {
    PostgresWorkStore::connect(&config.database_url, config.client_timeouts.database)
        .await
        .map_err(|e| IndexingError::config(format!("Failed to connect to catalog database: {}", e)))
}

/// Connect to OpenSearch with retry logic based on connection mode.
async fn connect_to_opensearch(config: &IndexerConfig) -> Result<OpenSearchProvider, IndexingError> {
    let index_config = IndexConfig::new(config.index_name.clone());

    loop {
        match try_connect_opensearch(
            &config.opensearch_url,
            index_config.clone(),
            config.client_timeouts.search,
        )
        .await
        {
            Ok(provider) => return Ok(provider),
            Err(e) => match config.connection_mode {
                ConnectionMode::FailFast => {
                    return Err(IndexingError::config(format!(
                        "Failed to connect to OpenSearch: {}",
                        e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        opensearch_url = %config.opensearch_url,
                        error = %e,
                        retry_interval_secs = config.retry_interval.as_secs(),
                        "Failed to connect to OpenSearch, retrying..."
                    );
                    sleep(config.retry_interval).await;
                }
            },
        }
    }
}

/// Build the provider and make sure the index exists.
///
/// Index creation is the first request sent, so it doubles as the
/// connectivity check.
async fn try_connect_opensearch(
    url: &str,
    index_config: IndexConfig,
    timeout: Duration,
) -> Result<OpenSearchProvider, IndexingError> {
    let provider = OpenSearchProvider::new(url, index_config, timeout)
        .await
        .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch provider: {}", e)))?;

    provider
        .ensure_index_exists()
        .await
        .map_err(|e| IndexingError::config(format!("Failed to ensure index exists: {}", e)))?;

    Ok(provider)
}
