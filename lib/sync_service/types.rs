use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::Error;

/// Flat, all-string record pushed to the search service's add endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedRecord {
    pub stream_id: String,
    pub title: String,
    pub plot: String,
    pub genre: String,
    pub release_date: String,
    pub rating: String,
    pub director: String,
    pub cast: String,
    pub movie_image: String,
    pub youtube_trailer: String,
    pub tmdb_id: String,
}

/// Fixed-delay retry budget for stream listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first attempt.
    pub max_attempts: u32,
    /// Slept after every failed attempt except the last.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Settings for one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VodUpdateConfig {
    /// Upper bound on category workers running at once. Every category is
    /// still dispatched; extra workers wait for a permit.
    pub max_concurrent_categories: usize,
    pub stream_retry: RetryPolicy,
}

impl Default for VodUpdateConfig {
    fn default() -> Self {
        Self {
            max_concurrent_categories: 16,
            stream_retry: RetryPolicy::default(),
        }
    }
}

/// Result of one category worker. `error` is `None` once the stream listing
/// succeeded, however many individual streams were skipped.
#[derive(Debug)]
pub struct CategoryOutcome {
    pub category_id: String,
    pub category_name: String,
    pub error: Option<Error>,
}

impl CategoryOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Pipeline step at which a single stream was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStage {
    Identify,
    FetchInfo,
    Normalize,
    Index,
}

impl fmt::Display for StreamStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Identify => "identify",
            Self::FetchInfo => "fetch_info",
            Self::Normalize => "normalize",
            Self::Index => "index",
        };
        f.write_str(label)
    }
}

/// A stream skipped inside an otherwise healthy category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamFailure {
    pub category_id: String,
    /// Stream identifier, or a JSON rendering of the raw value when it was unusable.
    pub stream_ref: String,
    pub stage: StreamStage,
    pub message: String,
}

/// A category entry dropped before dispatch because its identifiers were malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCategory {
    pub entry: String,
    pub reason: String,
}

/// Everything one category worker accumulated.
#[derive(Debug)]
pub struct CategoryReport {
    pub outcome: CategoryOutcome,
    pub records_indexed: usize,
    pub stream_failures: Vec<StreamFailure>,
}

/// Aggregate of one `update vod` run.
#[derive(Debug, Default)]
pub struct VodUpdateSummary {
    pub categories_listed: usize,
    pub skipped_categories: Vec<SkippedCategory>,
    pub outcomes: Vec<CategoryOutcome>,
    pub stream_failures: Vec<StreamFailure>,
    pub records_indexed: usize,
}

impl VodUpdateSummary {
    pub fn succeeded_categories(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_categories(&self) -> usize {
        self.outcomes.len() - self.succeeded_categories()
    }

    /// Categories stopped by cancellation. They also count as failed.
    pub fn cancelled_categories(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.error.as_ref().is_some_and(Error::is_cancelled))
            .count()
    }

    pub fn outcome_for(&self, category_id: &str) -> Option<&CategoryOutcome> {
        self.outcomes.iter().find(|o| o.category_id == category_id)
    }

    pub(crate) fn absorb(&mut self, report: CategoryReport) {
        self.records_indexed += report.records_indexed;
        self.stream_failures.extend(report.stream_failures);
        self.outcomes.push(report.outcome);
    }
}
