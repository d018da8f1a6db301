use crate::provider_client::{ProviderClientErr, ValidationError};
use crate::search_client::SearchClientErr;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Provider(#[from] ProviderClientErr),

    #[error(transparent)]
    Search(#[from] SearchClientErr),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("listing streams for category {category_id} failed after {attempts} attempts")]
    RetriesExhausted {
        category_id: String,
        attempts: u32,
        #[source]
        last_error: ProviderClientErr,
    },

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] JoinError),

    #[error("cancelled while processing category {category_id}")]
    Cancelled { category_id: String },
}

impl Error {
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
