//! Trade ingestion pipeline.
//!
//! One entry point: submit a `TradePayload`, get back exactly one
//! `TradeReaction`. All failures are absorbed into the reaction; nothing
//! escapes the pipeline boundary.

pub mod pipeline;

pub use pipeline::{TradePipeline, TradeTicket};
