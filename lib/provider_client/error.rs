use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderClientErr {
    /// Connection, DNS, timeout or body-read failure. The request URL is stripped
    /// because it carries the account credentials.
    #[error("request error while fetching {resource}: {source}")]
    Request {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status while fetching {resource}: {status}, response: {body}")]
    UnexpectedStatus {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("invalid JSON payload while fetching {resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid provider url: {0}")]
    InvalidUrl(String),
}

impl ProviderClientErr {
    pub fn request(resource: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            resource: resource.into(),
            source: source.without_url(),
        }
    }

    /// Short class name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "transport",
            Self::UnexpectedStatus { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}
