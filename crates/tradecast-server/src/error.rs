//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resolver error: {0}")]
    Resolver(#[from] tradecast_resolver::ResolveError),

    #[error("Stream error: {0}")]
    Stream(#[from] tradecast_stream::StreamError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tradecast_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
