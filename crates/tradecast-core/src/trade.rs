//! Trade payload and ingestion outcome types.

use crate::error::RejectCause;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade aggressor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Immutable raw trade fact as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePayload {
    /// Market token (e.g. "RTS").
    pub market: String,
    /// Instrument code token (e.g. "FT").
    pub code: String,
    /// Trade timestamp.
    pub timestamp: DateTime<Utc>,
    /// Trade price.
    pub price: Decimal,
    /// Trade size.
    pub size: Decimal,
    /// Aggressor side.
    pub side: TradeSide,
}

impl TradePayload {
    pub fn new(
        market: impl Into<String>,
        code: impl Into<String>,
        timestamp: DateTime<Utc>,
        price: Decimal,
        size: Decimal,
        side: TradeSide,
    ) -> Self {
        Self {
            market: market.into(),
            code: code.into(),
            timestamp,
            price,
            size,
            side,
        }
    }
}

/// Half-open time range `[start, end)` over stored trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Terminal outcome of one ingestion request.
///
/// Exactly one instance is produced per submitted payload.
#[derive(Debug)]
pub enum TradeReaction {
    /// The trade was durably written.
    Persisted(TradePayload),
    /// The trade was rejected; the cause list is non-empty.
    Rejected(Vec<RejectCause>),
}

impl TradeReaction {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    /// Rejection causes, empty for the persisted case.
    pub fn causes(&self) -> &[RejectCause] {
        match self {
            Self::Persisted(_) => &[],
            Self::Rejected(causes) => causes,
        }
    }
}
