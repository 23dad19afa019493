//! Resolver error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Cannot resolve an empty token")]
    EmptyToken,

    #[error("No uid assigned for token '{0}'")]
    UnknownToken(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Resolver pool is closed")]
    PoolClosed,
}

pub type ResolveResult<T> = Result<T, ResolveError>;
