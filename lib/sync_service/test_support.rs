use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::fetcher::{CatalogFetcher, RecordSink};
use super::types::{NormalizedRecord, RetryPolicy, VodUpdateConfig};
use crate::provider_client::{CategoryEntry, ProviderClientErr, StreamEntry, StreamInfo};
use crate::search_client::SearchClientErr;

/// Scripted provider response: a JSON body or an HTTP status failure.
#[derive(Clone)]
pub(super) enum Scripted {
    Body(Vec<Value>),
    Status(u16),
}

pub(super) fn test_update_config(max_concurrent: usize, max_attempts: u32) -> VodUpdateConfig {
    VodUpdateConfig {
        max_concurrent_categories: max_concurrent,
        stream_retry: RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(3),
        },
    }
}

pub(super) fn category(id: &str, name: &str) -> Value {
    json!({ "category_id": id, "category_name": name, "parent_id": 0 })
}

pub(super) fn stream(id: Value, name: &str) -> Value {
    json!({ "stream_id": id, "name": name })
}

pub(super) fn stream_info(stream_id: Value, title: &str, plot: &str) -> Value {
    json!({
        "info": { "plot": plot, "genre": "Drama", "rating": 7.5, "tmdb_id": "603" },
        "movie_data": { "stream_id": stream_id, "name": title }
    })
}

fn decode_all<T: serde::de::DeserializeOwned>(entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).expect("scripted entry should decode"))
        .collect()
}

fn status_err(resource: String, status: u16) -> ProviderClientErr {
    ProviderClientErr::UnexpectedStatus {
        resource,
        status,
        body: "scripted failure".to_string(),
    }
}

/// Provider catalog backed by scripted responses.
///
/// Stream listings are consumed front to back; the last scripted response for
/// a category repeats once the queue is down to one entry.
pub(super) struct MockCatalog {
    categories: Scripted,
    streams: Mutex<HashMap<String, VecDeque<Scripted>>>,
    infos: HashMap<String, Value>,
    list_calls: Mutex<HashMap<String, u32>>,
    info_calls: AtomicUsize,
    list_delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockCatalog {
    pub(super) fn new(categories: Scripted) -> Self {
        Self {
            categories,
            streams: Mutex::new(HashMap::new()),
            infos: HashMap::new(),
            list_calls: Mutex::new(HashMap::new()),
            info_calls: AtomicUsize::new(0),
            list_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub(super) fn with_streams(self, category_id: &str, responses: Vec<Scripted>) -> Self {
        self.streams
            .lock()
            .expect("streams mutex poisoned")
            .insert(category_id.to_string(), responses.into_iter().collect());
        self
    }

    pub(super) fn with_info(mut self, stream_id: &str, info: Value) -> Self {
        self.infos.insert(stream_id.to_string(), info);
        self
    }

    /// Makes every stream listing take `delay` so overlapping workers can be observed.
    pub(super) fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub(super) fn list_calls_for(&self, category_id: &str) -> u32 {
        *self
            .list_calls
            .lock()
            .expect("list_calls mutex poisoned")
            .get(category_id)
            .unwrap_or(&0)
    }

    pub(super) fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub(super) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_listing(&self, category_id: &str) -> Option<Scripted> {
        let mut streams = self.streams.lock().expect("streams mutex poisoned");
        let queue = streams.get_mut(category_id)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl CatalogFetcher for MockCatalog {
    fn list_categories<'a>(
        &'a self,
    ) -> BoxFuture<'a, Result<Vec<CategoryEntry>, ProviderClientErr>> {
        Box::pin(async move {
            match &self.categories {
                Scripted::Body(entries) => Ok(decode_all(entries.clone())),
                Scripted::Status(status) => Err(status_err("VOD categories".to_string(), *status)),
            }
        })
    }

    fn list_streams<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StreamEntry>, ProviderClientErr>> {
        Box::pin(async move {
            {
                let mut calls = self.list_calls.lock().expect("list_calls mutex poisoned");
                *calls.entry(category_id.to_string()).or_insert(0) += 1;
            }

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            if !self.list_delay.is_zero() {
                tokio::time::sleep(self.list_delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let resource = format!("VOD streams for category {category_id}");
            match self.next_listing(category_id) {
                Some(Scripted::Body(entries)) => Ok(decode_all(entries)),
                Some(Scripted::Status(status)) => Err(status_err(resource, status)),
                None => Err(status_err(resource, 404)),
            }
        })
    }

    fn get_stream_info<'a>(
        &'a self,
        stream_id: &'a str,
    ) -> BoxFuture<'a, Result<StreamInfo, ProviderClientErr>> {
        Box::pin(async move {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            let resource = format!("VOD info for stream {stream_id}");
            let raw = self
                .infos
                .get(stream_id)
                .cloned()
                .ok_or_else(|| status_err(resource.clone(), 404))?;
            serde_json::from_value(raw).map_err(|source| ProviderClientErr::Decode { resource, source })
        })
    }
}

/// Search index that records every add call.
#[derive(Default)]
pub(super) struct MockSink {
    rejected_stream_ids: HashSet<String>,
    added: Mutex<Vec<NormalizedRecord>>,
    calls: AtomicUsize,
    cancel_after_first_add: Option<CancellationToken>,
}

impl MockSink {
    /// Adds for these stream ids answer with HTTP 500.
    pub(super) fn rejecting(stream_ids: &[&str]) -> Self {
        Self {
            rejected_stream_ids: stream_ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Cancels `token` as soon as the first add call arrives.
    pub(super) fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_after_first_add: Some(token),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn added(&self) -> Vec<NormalizedRecord> {
        self.added.lock().expect("added mutex poisoned").clone()
    }

    pub(super) fn added_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .added()
            .into_iter()
            .map(|record| record.stream_id)
            .collect();
        ids.sort();
        ids
    }
}

impl RecordSink for MockSink {
    fn add_records<'a>(
        &'a self,
        records: &'a [NormalizedRecord],
    ) -> BoxFuture<'a, Result<(), SearchClientErr>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_after_first_add {
                token.cancel();
            }
            if records
                .iter()
                .any(|record| self.rejected_stream_ids.contains(&record.stream_id))
            {
                return Err(SearchClientErr::UnexpectedStatus {
                    endpoint: "add".to_string(),
                    status: 500,
                    body: "index unavailable".to_string(),
                });
            }
            self.added
                .lock()
                .expect("added mutex poisoned")
                .extend_from_slice(records);
            Ok(())
        })
    }
}
