pub mod error;
pub mod types;

pub use error::ProviderClientErr;
pub use types::{
    Category, CategoryEntry, InfoSection, MovieData, StreamEntry, StreamId, StreamInfo,
    ValidationError,
};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Request budget shared by every clone of a [`ProviderClient`], retries included.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub fn build_rate_limiter(requests_per_second: NonZeroU32) -> GlobalRateLimiter {
    Arc::new(RateLimiter::direct(Quota::per_second(requests_per_second)))
}

/// Keeps error bodies readable in logs when a provider answers with an HTML error page.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Endpoint paths for the three provider read operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub categories: String,
    pub streams: String,
    pub info: String,
}

/// Authenticated client for the IPTV provider's player API.
///
/// Cheap to clone: the underlying `reqwest::Client` and limiter are shared.
#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    endpoints: ProviderEndpoints,
    rate_limiter: Option<GlobalRateLimiter>,
}

impl ProviderClient {
    /// `client` should already carry the configured request timeout.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        endpoints: ProviderEndpoints,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            endpoints,
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: GlobalRateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// The status code is not checked here: any response whose body is a
    /// category array is accepted.
    pub async fn list_categories(&self) -> Result<Vec<CategoryEntry>, ProviderClientErr> {
        let url = self.build_url(&self.endpoints.categories, None)?;
        self.get_json("VOD categories", url, false).await
    }

    pub async fn list_streams(
        &self,
        category_id: &str,
    ) -> Result<Vec<StreamEntry>, ProviderClientErr> {
        let url = self.build_url(&self.endpoints.streams, Some(("category_id", category_id)))?;
        self.get_json(&format!("VOD streams for category {category_id}"), url, true)
            .await
    }

    pub async fn get_stream_info(&self, stream_id: &str) -> Result<StreamInfo, ProviderClientErr> {
        let url = self.build_url(&self.endpoints.info, Some(("vod_id", stream_id)))?;
        self.get_json(&format!("VOD info for {stream_id}"), url, true)
            .await
    }

    /// `{base}/{path}` followed by the optional identifier and the credentials.
    ///
    /// `path` normally carries its own `?action=...` query string.
    pub fn build_url(
        &self,
        path: &str,
        identifier: Option<(&str, &str)>,
    ) -> Result<Url, ProviderClientErr> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|err| ProviderClientErr::InvalidUrl(format!("{path}: {err}")))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some((key, value)) = identifier {
                query.append_pair(key, value);
            }
            query
                .append_pair("username", &self.username)
                .append_pair("password", &self.password);
        }
        Ok(url)
    }

    /// With `require_ok`, anything but 200 is an `UnexpectedStatus` carrying the body.
    async fn get_json<T>(
        &self,
        resource: &str,
        url: Url,
        require_ok: bool,
    ) -> Result<T, ProviderClientErr>
    where
        T: DeserializeOwned,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
        debug!("Fetching {}", resource);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ProviderClientErr::request(resource, err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProviderClientErr::request(resource, err))?;

        if require_ok && status != StatusCode::OK {
            return Err(ProviderClientErr::UnexpectedStatus {
                resource: resource.to_string(),
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        serde_json::from_str(&body).map_err(|source| ProviderClientErr::Decode {
            resource: resource.to_string(),
            source,
        })
    }
}

pub(crate) fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}
