//! Wire messages for the control and data channels.
//!
//! Both channels carry newline-delimited JSON, tag-discriminated on
//! `type`. Data payload messages carry no stream id; heartbeat probes
//! and responses do, since liveness is tracked per stream.

use serde::{Deserialize, Serialize};
use tradecast_core::{TimeInterval, TradePayload};

/// Opaque token naming one logical stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StreamId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request on the control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlRequest {
    OpenStream {
        market: String,
        code: String,
        interval: TimeInterval,
    },
    CloseStream {
        id: StreamId,
    },
}

/// Reply on the control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlReply {
    StreamOpened { id: StreamId },
    /// An open request that could not produce a stream. Recognized
    /// requests always get a reply; only unparseable lines are dropped.
    StreamRejected { reason: String },
    StreamClosed {},
}

/// Message published on the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PayloadMessage {
    /// One scanned trade record.
    Trades { payload: TradePayload },
    /// The stream's range is exhausted. Final message for its stream.
    Completed {},
    /// The stream's scan failed. Final message for its stream.
    Broken { reason: String },
    /// Heartbeat probe for one stream's subscriber.
    Ping { id: StreamId },
}

/// Message a subscriber sends back on its data connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubscriberMessage {
    Pong { id: StreamId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_stream_ids_are_unique() {
        assert_ne!(StreamId::generate(), StreamId::generate());
    }

    #[test]
    fn test_open_stream_roundtrip() {
        let request = ControlRequest::OpenStream {
            market: "RTS".to_string(),
            code: "FT".to_string(),
            interval: TimeInterval::new(
                Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
            ),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"openStream""#));
        let back: ControlRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);
    }

    #[test]
    fn test_stream_closed_serialization() {
        let json = serde_json::to_string(&ControlReply::StreamClosed {}).unwrap();
        assert_eq!(json, r#"{"type":"streamClosed"}"#);
    }

    #[test]
    fn test_stream_rejected_carries_reason() {
        let json = serde_json::to_string(&ControlReply::StreamRejected {
            reason: "unknown token".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"streamRejected","reason":"unknown token"}"#);
    }

    #[test]
    fn test_unrecognized_control_message_fails_parse() {
        let result = serde_json::from_str::<ControlRequest>(r#"{"type":"flushAll"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ping_carries_stream_id() {
        let id = StreamId::from("abc".to_string());
        let json = serde_json::to_string(&PayloadMessage::Ping { id: id.clone() }).unwrap();
        assert_eq!(json, r#"{"type":"ping","id":"abc"}"#);
        let pong: SubscriberMessage =
            serde_json::from_str(r#"{"type":"pong","id":"abc"}"#).unwrap();
        assert_eq!(pong, SubscriberMessage::Pong { id });
    }
}
