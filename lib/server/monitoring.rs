use crate::build_info;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use prometheus_client::registry::Registry;
use tokio::sync::OnceCell;

/// Registers a `{prefix}_build_info` gauge fixed at `1` whose labels carry the build identity.
pub fn register_build_info_metric(registry: &mut Registry, prefix: &str) {
    let build_info_metric = Family::<BuildInfoLabels, Gauge>::default();
    build_info_metric
        .get_or_create(&BuildInfoLabels {
            service: "vod_sync",
            version: build_info::VERSION,
            commit: build_info::short_commit_hash(),
        })
        .set(1);
    let sub_registry = registry.sub_registry_with_prefix(prefix);
    sub_registry.register(
        "build_info",
        "Build identity labels for this process",
        build_info_metric,
    );
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BuildInfoLabels {
    service: &'static str,
    version: &'static str,
    commit: &'static str,
}

/// Counters for VOD update runs. Orchestrators count into [`SYNC_METRICS`] once it is
/// initialized, or into an instance handed to them directly.
#[derive(Clone, Default)]
pub struct SyncMetrics {
    pub categories_dispatched: Counter,
    pub categories_failed: Counter,
    pub streams_indexed: Counter,
    /// Streams dropped at any stage (identify, info fetch, normalize, index).
    pub stream_failures: Counter,
    /// Extra stream-listing attempts beyond the first, per category.
    pub stream_list_retries: Counter,
}

impl SyncMetrics {
    /// Registers handles to these counters; every registry sees the same values.
    pub fn register(&self, registry: &mut Registry, prefix: &str) {
        let sub_registry = registry.sub_registry_with_prefix(prefix);
        sub_registry.register(
            "categories_dispatched",
            "Total number of category workers dispatched",
            self.categories_dispatched.clone(),
        );
        sub_registry.register(
            "categories_failed",
            "Total number of categories whose stream listing failed",
            self.categories_failed.clone(),
        );
        sub_registry.register(
            "streams_indexed",
            "Total number of VOD records accepted by the search service",
            self.streams_indexed.clone(),
        );
        sub_registry.register(
            "stream_failures",
            "Total number of streams skipped inside healthy categories",
            self.stream_failures.clone(),
        );
        sub_registry.register(
            "stream_list_retries",
            "Total number of retried stream listing attempts",
            self.stream_list_retries.clone(),
        );
    }
}

pub static SYNC_METRICS: OnceCell<SyncMetrics> = OnceCell::const_new();
