//! Trade enrichment, validation and binary serialization.
//!
//! The linear transformation chain behind ingestion:
//! `DraftTrade` (raw payload) → `EnrichedTrade` (resolved uids) →
//! `BinaryTrade` (storage-ready row key, qualifier and value bytes).
//! Each stage is produced once and consumed once; failures accumulate
//! into the same `Reaction` chain.

use crate::error::{SerializationError, ValidationError};
use crate::reaction::{Checks, Reaction};
use crate::trade::TradePayload;

/// A trade as received, before uid resolution.
#[derive(Debug, Clone)]
pub struct DraftTrade {
    pub payload: TradePayload,
}

impl DraftTrade {
    pub fn new(payload: TradePayload) -> Self {
        Self { payload }
    }
}

/// A trade with resolved market and code identifiers.
#[derive(Debug, Clone)]
pub struct EnrichedTrade {
    pub payload: TradePayload,
    pub market_uid: u32,
    pub code_uid: u32,
}

/// Storage-ready form of one trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTrade {
    /// Deterministic encoding of market uid + code uid + timestamp.
    pub row_key: Vec<u8>,
    /// Column qualifier, derived from trade content.
    pub qualifier: Vec<u8>,
    /// Payload bytes.
    pub value: Vec<u8>,
}

/// Validate a draft against its resolved uids.
///
/// Every failing check is accumulated; callers see all simultaneous
/// problems in one rejection.
pub fn enrich(draft: DraftTrade, market_uid: u32, code_uid: u32) -> Reaction<EnrichedTrade> {
    let payload = draft.payload;
    let mut checks = Checks::new();
    checks
        .ensure(!payload.market.is_empty(), ValidationError::EmptyMarketToken)
        .ensure(!payload.code.is_empty(), ValidationError::EmptyCodeToken)
        .ensure(
            market_uid != 0,
            ValidationError::InvalidMarketUid(payload.market.clone()),
        )
        .ensure(
            code_uid != 0,
            ValidationError::InvalidCodeUid(payload.code.clone()),
        )
        .ensure(
            payload.price.is_sign_positive() && !payload.price.is_zero(),
            ValidationError::NonPositivePrice(payload.price.to_string()),
        )
        .ensure(
            payload.size.is_sign_positive() && !payload.size.is_zero(),
            ValidationError::NonPositiveSize(payload.size.to_string()),
        );

    checks.finish(|| EnrichedTrade {
        payload,
        market_uid,
        code_uid,
    })
}

/// Derive the binary storage form of an enriched trade.
///
/// Row keys sort by (market uid, code uid, timestamp), which is what
/// gives range scans their ascending-timestamp order.
pub fn serialize(enriched: EnrichedTrade) -> Reaction<BinaryTrade> {
    let ts_millis = enriched.payload.timestamp.timestamp_millis();
    if ts_millis < 0 {
        return Reaction::reject(vec![SerializationError::PreEpochTimestamp(
            enriched.payload.timestamp.to_rfc3339(),
        )
        .into()]);
    }

    let value = match serde_json::to_vec(&enriched.payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Reaction::reject(vec![SerializationError::Encoding(e.to_string()).into()])
        }
    };

    Reaction::accept(BinaryTrade {
        row_key: encode_row_key(enriched.market_uid, enriched.code_uid, ts_millis),
        qualifier: enriched.payload.code.into_bytes(),
        value,
    })
}

/// Big-endian row key: market uid, code uid, millisecond timestamp.
pub fn encode_row_key(market_uid: u32, code_uid: u32, ts_millis: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&market_uid.to_be_bytes());
    key.extend_from_slice(&code_uid.to_be_bytes());
    key.extend_from_slice(&(ts_millis as u64).to_be_bytes());
    key
}
