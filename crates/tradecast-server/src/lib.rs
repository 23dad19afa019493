//! Tradecast server.
//!
//! Wires the ingestion pipeline and the streaming service behind three
//! TCP endpoints: ingest (request/reply), stream control (request/reply)
//! and data (pub/sub fan-out).

pub mod api;
pub mod app;
pub mod config;
pub mod error;

pub use api::{IngestReply, IngestRequest};
pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
