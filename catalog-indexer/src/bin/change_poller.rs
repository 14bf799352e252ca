//! Change Poller Entry Point
//!
//! Runs one change-detection pass: every work modified within the lookback
//! window is queued for indexing. Exits non-zero when enumeration fails or any
//! message could not be dispatched.

use catalog_indexer::poller::PollReport;
use catalog_indexer::{init_tracing, IndexerConfig, IndexingError, PollerDependencies};
use dotenv::dotenv;
use tracing::{error, info};

fn log_undelivered(report: &PollReport) {
    for failure in &report.failures {
        error!(
            identifiers = ?failure.identifiers,
            reason = %failure.reason,
            "Undelivered index messages"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv().ok();

    init_tracing("change-poller")?;

    let config = IndexerConfig::from_env()?;

    let mut deps = PollerDependencies::new(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize dependencies");
        e
    })?;

    let report = match deps.poller.run().await {
        Ok(report) => report,
        Err(failure) => {
            error!(
                error = %failure.source,
                enumerated = failure.report.enumerated,
                dispatched = failure.report.dispatched,
                undelivered = failure.report.undelivered(),
                "Change poll failed"
            );
            log_undelivered(&failure.report);
            return Err(IndexingError::from(failure.source));
        }
    };

    if !report.is_success() {
        log_undelivered(&report);
        return Err(IndexingError::DispatchFailed(report.undelivered()));
    }

    info!(
        enumerated = report.enumerated,
        dispatched = report.dispatched,
        "Change poll completed successfully"
    );
    Ok(())
}
