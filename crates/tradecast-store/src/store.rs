//! Put/scan interface over the trade storage engine.
//!
//! The engine itself is an external collaborator; this module defines
//! the seam the pipeline and scanner consume, plus an in-memory
//! column-family store with the same key ordering for tests and local
//! runs. Scans hand back a cursor, not a materialized batch: the next
//! record is fetched from the engine only when the cursor advances.

use crate::error::{StoreError, StoreResult};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use tradecast_core::{encode_row_key, BinaryTrade, TimeInterval, TradePayload};

/// One durable write.
#[derive(Debug, Clone)]
pub struct TradePut {
    pub row_key: Vec<u8>,
    pub column_family: &'static str,
    pub qualifier: Vec<u8>,
    pub value: Vec<u8>,
}

impl TradePut {
    /// Build the put for a serialized trade under the trade column family.
    pub fn from_binary(binary: BinaryTrade) -> Self {
        Self {
            row_key: binary.row_key,
            column_family: tradecast_core::TRADE_COLUMN_FAMILY,
            qualifier: binary.qualifier,
            value: binary.value,
        }
    }
}

/// Incremental reader over one scanned range.
///
/// `next` fetches one record at a time in ascending row-key order;
/// engine-side read state is held only between consecutive calls, so a
/// slow consumer never forces the whole range into memory.
pub trait TradeCursor: Send {
    fn next(&mut self) -> BoxFuture<'_, StoreResult<Option<TradePayload>>>;
}

/// Storage engine seam: single durable put and key-ordered range scan.
pub trait TradeStore: Send + Sync {
    fn put(&self, put: TradePut) -> BoxFuture<'_, StoreResult<()>>;

    /// Open a cursor over all trades for (market, code) within the
    /// interval, in ascending row-key (and therefore timestamp) order.
    fn scan(
        &self,
        market_uid: u32,
        code_uid: u32,
        interval: TimeInterval,
    ) -> BoxFuture<'_, StoreResult<Box<dyn TradeCursor>>>;
}

#[derive(Debug, Clone)]
struct StoredRow {
    qualifier: Vec<u8>,
    value: Vec<u8>,
}

/// In-memory store over a BTreeMap keyspace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<BTreeMap<Vec<u8>, StoredRow>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

impl TradeStore for MemoryStore {
    fn put(&self, put: TradePut) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            debug!(key_len = put.row_key.len(), cf = put.column_family, "Storing row");
            self.rows.lock().insert(
                put.row_key,
                StoredRow {
                    qualifier: put.qualifier,
                    value: put.value,
                },
            );
            Ok(())
        })
    }

    fn scan(
        &self,
        market_uid: u32,
        code_uid: u32,
        interval: TimeInterval,
    ) -> BoxFuture<'_, StoreResult<Box<dyn TradeCursor>>> {
        Box::pin(async move {
            let start_key = encode_row_key(
                market_uid,
                code_uid,
                interval.start.timestamp_millis().max(0),
            );
            let end_key = encode_row_key(
                market_uid,
                code_uid,
                interval.end.timestamp_millis().max(0),
            );
            let next_key = if interval.is_empty() {
                end_key.clone()
            } else {
                start_key
            };
            Ok(Box::new(MemoryCursor {
                rows: self.rows.clone(),
                next_key,
                end_key,
            }) as Box<dyn TradeCursor>)
        })
    }
}

struct MemoryCursor {
    rows: Arc<Mutex<BTreeMap<Vec<u8>, StoredRow>>>,
    next_key: Vec<u8>,
    end_key: Vec<u8>,
}

impl TradeCursor for MemoryCursor {
    fn next(&mut self) -> BoxFuture<'_, StoreResult<Option<TradePayload>>> {
        Box::pin(async move {
            if self.next_key >= self.end_key {
                return Ok(None);
            }
            let found = {
                let rows = self.rows.lock();
                rows.range(self.next_key.clone()..self.end_key.clone())
                    .next()
                    .map(|(key, row)| (key.clone(), row.clone()))
            };
            let (key, row) = match found {
                Some(entry) => entry,
                None => {
                    self.next_key = self.end_key.clone();
                    return Ok(None);
                }
            };
            let payload: TradePayload = serde_json::from_slice(&row.value)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?;
            // The key range already bounds timestamps; the qualifier
            // check guards against uid collisions across tokens.
            debug_assert_eq!(row.qualifier, payload.code.as_bytes());
            // Smallest key strictly greater than the one just read.
            self.next_key = key;
            self.next_key.push(0);
            Ok(Some(payload))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};
    use rust_decimal_macros::dec;
    use tradecast_core::{enrich, serialize, DraftTrade, TradeSide};

    fn stored_payload(hour: u32, minute: u32) -> TradePayload {
        TradePayload::new(
            "RTS",
            "FT",
            Utc.with_ymd_and_hms(2020, 1, 1, hour, minute, 0).unwrap(),
            dec!(99.5),
            dec!(2),
            TradeSide::Buy,
        )
    }

    async fn put_trade(store: &MemoryStore, payload: TradePayload) {
        let binary = enrich(DraftTrade::new(payload), 7, 12)
            .and_then(serialize)
            .into_result()
            .unwrap();
        store.put(TradePut::from_binary(binary)).await.unwrap();
    }

    async fn drain(mut cursor: Box<dyn TradeCursor>) -> Vec<TradePayload> {
        let mut records = Vec::new();
        while let Some(payload) = cursor.next().await.unwrap() {
            records.push(payload);
        }
        records
    }

    #[tokio::test]
    async fn test_scan_returns_interval_in_order() {
        let store = MemoryStore::new();
        // Insert out of order.
        put_trade(&store, stored_payload(14, 0)).await;
        put_trade(&store, stored_payload(10, 0)).await;
        put_trade(&store, stored_payload(12, 30)).await;

        let interval = TimeInterval::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        );
        let records = drain(store.scan(7, 12, interval).await.unwrap()).await;
        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_scan_excludes_interval_end() {
        let store = MemoryStore::new();
        put_trade(&store, stored_payload(12, 0)).await;

        let interval = TimeInterval::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
        );
        assert!(drain(store.scan(7, 12, interval).await.unwrap()).await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_other_instrument_is_empty() {
        let store = MemoryStore::new();
        put_trade(&store, stored_payload(12, 0)).await;

        let interval = TimeInterval::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        );
        assert!(drain(store.scan(7, 99, interval).await.unwrap()).await.is_empty());
    }

    #[tokio::test]
    async fn test_cursor_reads_incrementally() {
        let store = MemoryStore::new();
        put_trade(&store, stored_payload(10, 0)).await;

        let interval = TimeInterval::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        );
        let mut cursor = store.scan(7, 12, interval).await.unwrap();
        let first = cursor.next().await.unwrap().expect("seeded record");
        assert_eq!(first.timestamp.hour(), 10);

        // A row written behind the cursor's position is still reached:
        // nothing was materialized when the scan opened.
        put_trade(&store, stored_payload(15, 0)).await;
        let second = cursor.next().await.unwrap().expect("late row visible");
        assert_eq!(second.timestamp.hour(), 15);
        assert!(cursor.next().await.unwrap().is_none());
    }
}
