//! Streaming service error types.

use thiserror::Error;
use tradecast_resolver::ResolveError;

#[derive(Debug, Error)]
pub enum StreamError {
    /// Socket-level failure on a shared endpoint. Fatal to the whole
    /// streaming service.
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Uid resolution failed for '{token}': {source}")]
    Resolution {
        token: String,
        #[source]
        source: ResolveError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;
