//! Error types for tradecast-core.

use thiserror::Error;

/// Field-level validation failure.
///
/// Accumulated into a rejection cause list, never fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Market token is empty")]
    EmptyMarketToken,

    #[error("Code token is empty")]
    EmptyCodeToken,

    #[error("Resolved market uid is zero for token '{0}'")]
    InvalidMarketUid(String),

    #[error("Resolved code uid is zero for token '{0}'")]
    InvalidCodeUid(String),

    #[error("Trade price must be positive, got {0}")]
    NonPositivePrice(String),

    #[error("Trade size must be positive, got {0}")]
    NonPositiveSize(String),
}

/// Failure while deriving the binary storage form of a trade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("Timestamp {0} predates the epoch, row key would not sort")]
    PreEpochTimestamp(String),

    #[error("Payload encoding failed: {0}")]
    Encoding(String),
}

/// An error value carrying a message and an optional underlying cause.
///
/// Used wherever failures from external collaborators (resolver, storage)
/// are wrapped into a rejection.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Fault {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Fault {
    /// A fault with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// A fault wrapping an underlying cause.
    pub fn wrap(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A single cause inside a trade rejection.
///
/// Validation and serialization causes are produced by the enrichment
/// chain; resolution and storage causes wrap external failures.
#[derive(Debug, Error)]
pub enum RejectCause {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("Uid resolution failed: {0}")]
    Resolution(Fault),

    #[error("Storage write failed: {0}")]
    StorageWrite(Fault),

    #[error("Internal failure: {0}")]
    Internal(Fault),
}

impl RejectCause {
    /// Wrap a resolver failure for one token.
    pub fn resolution(
        token: &str,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Resolution(Fault::wrap(format!("token '{token}'"), cause))
    }

    /// Wrap a storage put failure.
    pub fn storage_write(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StorageWrite(Fault::wrap("put rejected by storage engine", cause))
    }

    /// Stable label for grouping causes in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Serialization(_) => "serialization",
            Self::Resolution(_) => "resolution",
            Self::StorageWrite(_) => "storage_write",
            Self::Internal(_) => "internal",
        }
    }
}
