//! Core domain types for tradecast.
//!
//! This crate provides the fundamental types shared across the system:
//! - `TradePayload`: immutable raw trade fact as submitted by callers
//! - `Reaction<T>`: accept/reject outcome of a validating transformation,
//!   carrying accumulated causes on rejection
//! - `DraftTrade` → `EnrichedTrade` → `BinaryTrade`: the enrichment and
//!   serialization chain that produces a storage-ready record
//! - `TradeReaction`: terminal outcome of one ingestion request

pub mod enrich;
pub mod error;
pub mod reaction;
pub mod trade;

pub use enrich::{encode_row_key, enrich, serialize, BinaryTrade, DraftTrade, EnrichedTrade};
pub use error::{Fault, RejectCause, SerializationError, ValidationError};
pub use reaction::{Checks, Reaction};
pub use trade::{TimeInterval, TradePayload, TradeReaction, TradeSide};

/// Column family every binary trade record is written under.
pub const TRADE_COLUMN_FAMILY: &str = "t";
