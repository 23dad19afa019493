//! Storage error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Put rejected: {0}")]
    PutRejected(String),

    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Stored row is not decodable: {0}")]
    CorruptRow(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
