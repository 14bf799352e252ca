//! Change-detection stage.
//!
//! Enumerates the works modified within the lookback window and dispatches an
//! index message for each of them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::dispatcher::BatchDispatcher;
use crate::enumerator::ChangeEnumerator;
use crate::errors::{DispatchError, IngestError};
use catalog_indexer_shared::IndexMessage;

/// Summary of one polling run.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Number of changed works found.
    pub enumerated: usize,
    /// Number of index messages delivered to the queue.
    pub dispatched: usize,
    /// Number of batch-send groups flushed.
    pub flushes: usize,
    /// Groups (or entries) that could not be delivered.
    pub failures: Vec<DispatchError>,
}

impl PollReport {
    /// Whether every enumerated work was dispatched.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of work identifiers that were not delivered.
    pub fn undelivered(&self) -> usize {
        self.failures.iter().map(|f| f.identifiers.len()).sum()
    }
}

/// A run that stopped early, with everything it did before stopping.
#[derive(Error, Debug)]
#[error("Change poll aborted after {} work(s): {source}", .report.enumerated)]
pub struct PollFailure {
    pub source: IngestError,
    pub report: PollReport,
}

impl PollFailure {
    fn before_start(source: IngestError) -> Self {
        Self {
            source,
            report: PollReport::default(),
        }
    }
}

/// Start of the window ending at `now` and reaching `lookback` back.
pub fn window_start(now: DateTime<Utc>, lookback: Duration) -> Result<DateTime<Utc>, IngestError> {
    let invalid = || IngestError::data_shape(format!("Lookback window of {:?} is out of range", lookback));

    let delta = chrono::Duration::from_std(lookback).map_err(|_| invalid())?;
    now.checked_sub_signed(delta).ok_or_else(invalid)
}

/// Drives one change-detection run: enumerator into dispatcher.
pub struct ChangePoller {
    enumerator: ChangeEnumerator,
    dispatcher: BatchDispatcher,
    lookback: Duration,
}

impl ChangePoller {
    /// Create a new poller.
    ///
    /// # Arguments
    ///
    /// * `enumerator` - Source of changed works
    /// * `dispatcher` - Batches index messages onto the queue
    /// * `lookback` - How far back from now a work counts as changed
    pub fn new(enumerator: ChangeEnumerator, dispatcher: BatchDispatcher, lookback: Duration) -> Self {
        Self {
            enumerator,
            dispatcher,
            lookback,
        }
    }

    /// Poll for works modified within the lookback window.
    pub async fn run(&mut self) -> Result<PollReport, PollFailure> {
        let since = window_start(Utc::now(), self.lookback).map_err(PollFailure::before_start)?;

        self.poll_since(since).await
    }

    /// Poll for works modified at or after `since`.
    ///
    /// Dispatch failures are collected in the report and do not stop the
    /// run. A source store failure stops enumeration; pending messages are
    /// still flushed, and the partial report travels with the error.
    #[instrument(skip(self), fields(since = %since))]
    pub async fn poll_since(&mut self, since: DateTime<Utc>) -> Result<PollReport, PollFailure> {
        info!("Starting change poll");

        let mut report = PollReport::default();
        let dispatched_before = self.dispatcher.dispatched_count();
        let flushes_before = self.dispatcher.flush_count();
        let mut changes = self.enumerator.enumerate(since);

        while let Some(change) = changes.next().await {
            let work = match change {
                Ok(work) => work,
                Err(e) => {
                    error!(error = %e, enumerated = report.enumerated, "Enumeration failed");
                    if let Err(failure) = self.dispatcher.flush().await {
                        warn!(error = %failure, "Flush after enumeration failure did not deliver");
                        report.failures.push(failure);
                    }
                    report.dispatched = self.dispatcher.dispatched_count() - dispatched_before;
                    report.flushes = self.dispatcher.flush_count() - flushes_before;
                    return Err(PollFailure { source: e, report });
                }
            };

            report.enumerated += 1;

            if let Err(failure) = self.dispatcher.add(&IndexMessage::for_work(&work.uuid)).await {
                warn!(error = %failure, "Dispatch group failed");
                report.failures.push(failure);
            }
        }

        if let Err(failure) = self.dispatcher.flush().await {
            warn!(error = %failure, "Final dispatch group failed");
            report.failures.push(failure);
        }

        report.dispatched = self.dispatcher.dispatched_count() - dispatched_before;
        report.flushes = self.dispatcher.flush_count() - flushes_before;

        info!(
            enumerated = report.enumerated,
            dispatched = report.dispatched,
            flushes = report.flushes,
            undelivered = report.undelivered(),
            "Change poll finished"
        );

        Ok(report)
    }
}
