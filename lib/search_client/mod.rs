use log::debug;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider_client::truncate_body;
use crate::sync_service::types::NormalizedRecord;

#[derive(Error, Debug)]
pub enum SearchClientErr {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to serialize {endpoint} payload: {source}")]
    Serialize {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("non-OK HTTP status from {endpoint}: {status}, response: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid search service url: {0}")]
    InvalidUrl(String),
}

/// Paths on the search service, relative to its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEndpoints {
    pub add: String,
    pub query: String,
    pub embed: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    metadata: &'a [NormalizedRecord],
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    sentences: &'a [String],
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    property: &'a str,
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryHit>,
}

/// One match returned by the search service's query endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueryHit {
    pub metadata: NormalizedRecord,
    #[serde(default)]
    pub distance: f32,
}

/// Client for the downstream search/indexing service.
#[derive(Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
    endpoints: SearchEndpoints,
}

impl SearchClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        endpoints: SearchEndpoints,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            endpoints,
        }
    }

    /// Posts `{"metadata": [...]}` to the add endpoint.
    pub async fn add_records(&self, records: &[NormalizedRecord]) -> Result<(), SearchClientErr> {
        debug!("Sending {} record(s) to search service", records.len());
        self.post(&self.endpoints.add, &AddRequest { metadata: records })
            .await
            .map(|_| ())
    }

    /// Posts `{"sentences": [...]}` to the embed endpoint.
    pub async fn embed(&self, sentences: &[String]) -> Result<(), SearchClientErr> {
        self.post(&self.endpoints.embed, &EmbedRequest { sentences })
            .await
            .map(|_| ())
    }

    /// Searches one indexed property. Missing metadata fields in the response
    /// come back as empty strings.
    pub async fn query_records(
        &self,
        property: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<QueryHit>, SearchClientErr> {
        let endpoint = &self.endpoints.query;
        let body = self
            .post(
                endpoint,
                &QueryRequest {
                    property,
                    query,
                    top_k,
                },
            )
            .await?;
        let response: QueryResponse =
            serde_json::from_str(&body).map_err(|source| SearchClientErr::Decode {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(response.results)
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url, SearchClientErr> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|err| SearchClientErr::InvalidUrl(format!("{raw}: {err}")))
    }

    /// Sends a JSON POST and returns the response body when the status is 200.
    async fn post<P>(&self, path: &str, payload: &P) -> Result<String, SearchClientErr>
    where
        P: Serialize,
    {
        let url = self.endpoint_url(path)?;
        let body = serde_json::to_vec(payload).map_err(|source| SearchClientErr::Serialize {
            endpoint: path.to_string(),
            source,
        })?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| SearchClientErr::Request {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| SearchClientErr::Request {
                endpoint: path.to_string(),
                source,
            })?;

        if status != StatusCode::OK {
            return Err(SearchClientErr::UnexpectedStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }
        Ok(text)
    }
}
