use futures::future::join_all;
use std::slice;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::Error;
use super::fetcher::{CatalogFetcher, RecordSink};
use super::normalizer::normalize;
use super::retry::run_with_retry;
use super::types::{
    CategoryOutcome, CategoryReport, RetryPolicy, SkippedCategory, StreamFailure, StreamStage,
    VodUpdateConfig, VodUpdateSummary,
};
use crate::provider_client::{Category, StreamEntry};
use crate::server::monitoring::{SyncMetrics, SYNC_METRICS};

/// Drives one full VOD catalog sync: categories, then one worker per category.
///
/// Collaborators are injected so the same pipeline runs against the live
/// provider/search service and against scripted mocks.
pub struct VodUpdateOrchestrator<F, S>
where
    F: CatalogFetcher + 'static,
    S: RecordSink + 'static,
{
    fetcher: Arc<F>,
    sink: Arc<S>,
    config: VodUpdateConfig,
    cancel_token: CancellationToken,
    metrics: Option<SyncMetrics>,
}

impl<F, S> VodUpdateOrchestrator<F, S>
where
    F: CatalogFetcher + 'static,
    S: RecordSink + 'static,
{
    pub fn new(fetcher: F, sink: S, config: VodUpdateConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sink: Arc::new(sink),
            config,
            cancel_token: CancellationToken::new(),
            metrics: SYNC_METRICS.get().cloned(),
        }
    }

    /// Counts into `metrics` instead of the process-wide registry.
    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Workers stop between streams, or during a retry delay, once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Runs the pipeline once.
    ///
    /// Only a failed category listing is an error. Category and stream failures
    /// are logged and collected in the returned summary; the run still succeeds.
    /// Returns after every dispatched worker has reported its outcome.
    pub async fn run(&self) -> Result<VodUpdateSummary, Error> {
        info!(event = "vod_update_started", "Starting VOD update process...");

        let entries = self.fetcher.list_categories().await.map_err(|err| {
            error!(event = "vod_categories_failed", error = %err, "error fetching VOD categories");
            Error::from(err)
        })?;

        let mut summary = VodUpdateSummary {
            categories_listed: entries.len(),
            ..VodUpdateSummary::default()
        };

        let mut categories = Vec::with_capacity(entries.len());
        for entry in &entries {
            match entry.validate() {
                Ok(category) => categories.push(category),
                Err(err) => {
                    warn!(
                        event = "category_skipped",
                        entry = %entry.describe(),
                        reason = %err,
                        "skipping malformed category"
                    );
                    summary.skipped_categories.push(SkippedCategory {
                        entry: entry.describe(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            event = "vod_categories_dispatching",
            listed = summary.categories_listed,
            dispatched = categories.len(),
            skipped = summary.skipped_categories.len(),
            max_concurrent = self.config.max_concurrent_categories,
            "dispatching category workers"
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_categories.max(1)));
        let mut labels = Vec::with_capacity(categories.len());
        let mut handles = Vec::with_capacity(categories.len());
        for category in categories {
            labels.push((category.category_id.clone(), category.category_name.clone()));
            let worker = CategoryWorker {
                fetcher: Arc::clone(&self.fetcher),
                sink: Arc::clone(&self.sink),
                retry: self.config.stream_retry,
                cancel_token: self.cancel_token.clone(),
                metrics: self.metrics.clone(),
            };
            let permits = Arc::clone(&permits);
            if let Some(metrics) = &self.metrics {
                metrics.categories_dispatched.inc();
            }
            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();
                worker.process(category).await
            }));
        }

        let results = join_all(handles).await;
        for ((category_id, category_name), result) in labels.into_iter().zip(results) {
            let report = match result {
                Ok(report) => report,
                Err(join_err) => CategoryReport {
                    outcome: CategoryOutcome {
                        category_id,
                        category_name,
                        error: Some(Error::TaskJoinError(join_err)),
                    },
                    records_indexed: 0,
                    stream_failures: Vec::new(),
                },
            };
            log_outcome(&report, self.metrics.as_ref());
            summary.absorb(report);
        }

        info!(
            event = "vod_update_completed",
            categories_succeeded = summary.succeeded_categories(),
            categories_failed = summary.failed_categories(),
            categories_cancelled = summary.cancelled_categories(),
            records_indexed = summary.records_indexed,
            stream_failures = summary.stream_failures.len(),
            "VOD update process completed"
        );
        Ok(summary)
    }
}

fn log_outcome(report: &CategoryReport, metrics: Option<&SyncMetrics>) {
    let outcome = &report.outcome;
    match &outcome.error {
        None => info!(
            event = "category_processed",
            category_id = %outcome.category_id,
            category_name = %outcome.category_name,
            records_indexed = report.records_indexed,
            streams_skipped = report.stream_failures.len(),
            "Successfully processed category {} ({})",
            outcome.category_name,
            outcome.category_id
        ),
        Some(err) => {
            if let Some(metrics) = metrics {
                metrics.categories_failed.inc();
            }
            error!(
                event = "category_failed",
                category_id = %outcome.category_id,
                category_name = %outcome.category_name,
                error = %err,
                "Error processing category {} ({})",
                outcome.category_name,
                outcome.category_id
            )
        }
    }
}

/// Processes one category: list its streams (retried), then index each stream in order.
struct CategoryWorker<F, S> {
    fetcher: Arc<F>,
    sink: Arc<S>,
    retry: RetryPolicy,
    cancel_token: CancellationToken,
    metrics: Option<SyncMetrics>,
}

impl<F, S> CategoryWorker<F, S>
where
    F: CatalogFetcher,
    S: RecordSink,
{
    async fn process(&self, category: Category) -> CategoryReport {
        let Category {
            category_id,
            category_name,
            ..
        } = category;
        let mut report = CategoryReport {
            outcome: CategoryOutcome {
                category_id: category_id.clone(),
                category_name,
                error: None,
            },
            records_indexed: 0,
            stream_failures: Vec::new(),
        };

        if self.cancel_token.is_cancelled() {
            report.outcome.error = Some(Error::Cancelled { category_id });
            return report;
        }

        let listing = run_with_retry(&self.retry, "list_streams", &self.cancel_token, |_| {
            self.fetcher.list_streams(&category_id)
        })
        .await;

        let streams = match listing {
            Ok((streams, attempts)) => {
                self.record_retries(attempts);
                streams
            }
            Err(terminal) if terminal.cancelled => {
                self.record_retries(terminal.attempts);
                report.outcome.error = Some(Error::Cancelled { category_id });
                return report;
            }
            Err(terminal) => {
                self.record_retries(terminal.attempts);
                report.outcome.error = Some(Error::RetriesExhausted {
                    category_id,
                    attempts: terminal.attempts,
                    last_error: terminal.error,
                });
                return report;
            }
        };
        debug!(
            event = "category_streams_listed",
            category_id = %category_id,
            streams = streams.len(),
            "listed streams"
        );

        for entry in &streams {
            if self.cancel_token.is_cancelled() {
                warn!(
                    event = "category_cancelled",
                    category_id = %category_id,
                    "cancellation requested, stopping category"
                );
                report.outcome.error = Some(Error::Cancelled {
                    category_id: category_id.clone(),
                });
                break;
            }
            match self.process_stream(&category_id, entry).await {
                Ok(()) => report.records_indexed += 1,
                Err(failure) => report.stream_failures.push(failure),
            }
        }

        report
    }

    /// Identify, fetch, normalize and index one stream. Any step failing only
    /// skips this stream.
    async fn process_stream(
        &self,
        category_id: &str,
        entry: &StreamEntry,
    ) -> Result<(), StreamFailure> {
        let stream_id = entry.stream_id().map_err(|err| {
            self.stream_failure(category_id, entry.raw_id(), StreamStage::Identify, err)
        })?;

        let info = self
            .fetcher
            .get_stream_info(&stream_id)
            .await
            .map_err(|err| {
                self.stream_failure(category_id, stream_id.clone(), StreamStage::FetchInfo, err)
            })?;

        let record = normalize(&info).map_err(|skip| {
            self.stream_failure(category_id, stream_id.clone(), StreamStage::Normalize, skip)
        })?;

        if record.stream_id != stream_id {
            warn!(
                event = "stream_id_mismatch",
                category_id,
                requested = %stream_id,
                returned = %record.stream_id,
                "provider returned info for a different stream id"
            );
        }

        self.sink
            .add_records(slice::from_ref(&record))
            .await
            .map_err(|err| {
                self.stream_failure(category_id, stream_id.clone(), StreamStage::Index, err)
            })?;

        if let Some(metrics) = &self.metrics {
            metrics.streams_indexed.inc();
        }
        info!(
            event = "stream_indexed",
            category_id,
            stream_id = %stream_id,
            title = entry.name().unwrap_or(record.title.as_str()),
            "Successfully sent data for VOD {} to search service",
            stream_id
        );
        Ok(())
    }

    fn record_retries(&self, attempts: u32) {
        if attempts > 1 {
            if let Some(metrics) = &self.metrics {
                metrics.stream_list_retries.inc_by(u64::from(attempts - 1));
            }
        }
    }

    fn stream_failure(
        &self,
        category_id: &str,
        stream_ref: String,
        stage: StreamStage,
        err: impl std::fmt::Display,
    ) -> StreamFailure {
        let message = err.to_string();
        warn!(
            event = "stream_skipped",
            category_id,
            stream = %stream_ref,
            stage = %stage,
            error = %message,
            "skipping stream"
        );
        if let Some(metrics) = &self.metrics {
            metrics.stream_failures.inc();
        }
        StreamFailure {
            category_id: category_id.to_string(),
            stream_ref,
            stage,
            message,
        }
    }
}
