mod error;
pub mod fetcher;
pub mod normalizer;
mod orchestrator;
pub mod retry;
pub mod types;

#[cfg(test)]
mod orchestrator_tests;
#[cfg(test)]
mod test_support;

use tokio_util::sync::CancellationToken;

pub use error::Error;
pub use fetcher::{CatalogFetcher, RecordSink};
pub use orchestrator::VodUpdateOrchestrator;
pub use types::{NormalizedRecord, VodUpdateConfig, VodUpdateSummary};

use crate::provider_client::ProviderClient;
use crate::search_client::SearchClient;

/// Wires the live provider and search clients into one VOD update run.
pub struct SyncService {
    provider: ProviderClient,
    search: SearchClient,
    config: VodUpdateConfig,
}

impl SyncService {
    pub fn new(provider: ProviderClient, search: SearchClient, config: VodUpdateConfig) -> Self {
        Self {
            provider,
            search,
            config,
        }
    }

    /// Re-fetches the whole catalog and pushes every record to the search index.
    pub async fn update_vod(
        &self,
        cancel_token: CancellationToken,
    ) -> Result<VodUpdateSummary, Error> {
        VodUpdateOrchestrator::new(self.provider.clone(), self.search.clone(), self.config)
            .with_cancellation(cancel_token)
            .run()
            .await
    }
}
