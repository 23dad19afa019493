//! Wire messages for the ingestion endpoint.
//!
//! Newline-delimited JSON, tag-discriminated on `type`, mirroring the
//! streaming control channel. Every request gets exactly one reply.

use serde::{Deserialize, Serialize};
use tradecast_core::{TradePayload, TradeReaction};

/// Request on the ingestion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IngestRequest {
    AddTrade { payload: TradePayload },
}

/// Reply on the ingestion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IngestReply {
    TradePersisted { payload: TradePayload },
    TradeRejected { causes: Vec<String> },
}

impl From<TradeReaction> for IngestReply {
    fn from(reaction: TradeReaction) -> Self {
        match reaction {
            TradeReaction::Persisted(payload) => Self::TradePersisted { payload },
            TradeReaction::Rejected(causes) => Self::TradeRejected {
                causes: causes.iter().map(|c| c.to_string()).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tradecast_core::TradeSide;

    #[test]
    fn test_add_trade_roundtrip() {
        let request = IngestRequest::AddTrade {
            payload: TradePayload::new(
                "RTS",
                "FT",
                Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
                dec!(250.75),
                dec!(4),
                TradeSide::Buy,
            ),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"addTrade""#));
        assert_eq!(serde_json::from_str::<IngestRequest>(&json).unwrap(), request);
    }

    #[test]
    fn test_rejection_carries_cause_messages() {
        let reaction = TradeReaction::Rejected(vec![
            tradecast_core::ValidationError::EmptyMarketToken.into(),
        ]);
        let reply = IngestReply::from(reaction);
        match reply {
            IngestReply::TradeRejected { causes } => {
                assert_eq!(causes, vec!["Market token is empty".to_string()]);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
