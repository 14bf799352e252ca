//! Catalog Indexer Main Entry Point
//!
//! Runs the indexing stage: consumes index messages from Kafka and writes
//! flattened work documents into OpenSearch.

use catalog_indexer::{init_tracing, Dependencies, IndexerConfig, IndexingError};
use dotenv::dotenv;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing("catalog-indexer")?;

    info!("Starting catalog indexer");

    let config = IndexerConfig::from_env()?;

    let mut deps = match Dependencies::new(&config).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.orchestrator.run().await {
        Ok(()) => {
            info!("Catalog indexer completed successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Catalog indexer failed");
            Err(e.into())
        }
    }
}
