use std::sync::Arc;

use futures::future::BoxFuture;

use super::types::NormalizedRecord;
use crate::provider_client::{
    CategoryEntry, ProviderClient, ProviderClientErr, StreamEntry, StreamInfo,
};
use crate::search_client::{SearchClient, SearchClientErr};

/// Read side of the pipeline: the provider catalog.
///
/// Exists so the orchestrator can run against scripted catalogs in tests.
pub trait CatalogFetcher: Send + Sync {
    fn list_categories<'a>(&'a self)
        -> BoxFuture<'a, Result<Vec<CategoryEntry>, ProviderClientErr>>;

    fn list_streams<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StreamEntry>, ProviderClientErr>>;

    fn get_stream_info<'a>(
        &'a self,
        stream_id: &'a str,
    ) -> BoxFuture<'a, Result<StreamInfo, ProviderClientErr>>;
}

/// Write side of the pipeline: the search index.
pub trait RecordSink: Send + Sync {
    fn add_records<'a>(
        &'a self,
        records: &'a [NormalizedRecord],
    ) -> BoxFuture<'a, Result<(), SearchClientErr>>;
}

impl<T> CatalogFetcher for Arc<T>
where
    T: CatalogFetcher + ?Sized,
{
    fn list_categories<'a>(
        &'a self,
    ) -> BoxFuture<'a, Result<Vec<CategoryEntry>, ProviderClientErr>> {
        (**self).list_categories()
    }

    fn list_streams<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StreamEntry>, ProviderClientErr>> {
        (**self).list_streams(category_id)
    }

    fn get_stream_info<'a>(
        &'a self,
        stream_id: &'a str,
    ) -> BoxFuture<'a, Result<StreamInfo, ProviderClientErr>> {
        (**self).get_stream_info(stream_id)
    }
}

impl<T> RecordSink for Arc<T>
where
    T: RecordSink + ?Sized,
{
    fn add_records<'a>(
        &'a self,
        records: &'a [NormalizedRecord],
    ) -> BoxFuture<'a, Result<(), SearchClientErr>> {
        (**self).add_records(records)
    }
}

impl CatalogFetcher for ProviderClient {
    fn list_categories<'a>(
        &'a self,
    ) -> BoxFuture<'a, Result<Vec<CategoryEntry>, ProviderClientErr>> {
        Box::pin(ProviderClient::list_categories(self))
    }

    fn list_streams<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StreamEntry>, ProviderClientErr>> {
        Box::pin(ProviderClient::list_streams(self, category_id))
    }

    fn get_stream_info<'a>(
        &'a self,
        stream_id: &'a str,
    ) -> BoxFuture<'a, Result<StreamInfo, ProviderClientErr>> {
        Box::pin(ProviderClient::get_stream_info(self, stream_id))
    }
}

impl RecordSink for SearchClient {
    fn add_records<'a>(
        &'a self,
        records: &'a [NormalizedRecord],
    ) -> BoxFuture<'a, Result<(), SearchClientErr>> {
        Box::pin(SearchClient::add_records(self, records))
    }
}
