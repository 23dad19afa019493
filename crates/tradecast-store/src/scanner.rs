//! Trade scanner: a lazy, acknowledged cursor over one stored range.
//!
//! `open()` spawns a producer task that drives a store cursor and feeds
//! records through a capacity-1 channel. The consumer must `ack()` each
//! record before the next one is fetched from the cursor, so engine-side
//! read state is released as the consumer advances. Exactly one terminal
//! event (`Completed` or `Failed`) follows the last record.

use crate::error::StoreError;
use crate::store::TradeStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tradecast_core::{TimeInterval, TradePayload};

/// One event from an open scan.
#[derive(Debug)]
pub enum ScanEvent {
    /// The next decoded trade record, in ascending timestamp order.
    Record(TradePayload),
    /// The range is exhausted. Final event.
    Completed,
    /// The scan failed. Final event.
    Failed(StoreError),
}

/// A range read over stored trades for (market, code, interval).
pub struct TradeScanner {
    store: Arc<dyn TradeStore>,
    market_uid: u32,
    code_uid: u32,
    interval: TimeInterval,
}

impl TradeScanner {
    pub fn new(
        store: Arc<dyn TradeStore>,
        market_uid: u32,
        code_uid: u32,
        interval: TimeInterval,
    ) -> Self {
        Self {
            store,
            market_uid,
            code_uid,
            interval,
        }
    }

    /// Start producing and hand back the consuming side.
    pub fn open(self) -> ScanHandle {
        let (event_tx, event_rx) = mpsc::channel(1);
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        tokio::spawn(produce(
            self.store,
            self.market_uid,
            self.code_uid,
            self.interval,
            event_tx,
            ack_rx,
            cancel.clone(),
        ));

        ScanHandle {
            events: event_rx,
            ack_tx,
            cancel,
        }
    }
}

async fn produce(
    store: Arc<dyn TradeStore>,
    market_uid: u32,
    code_uid: u32,
    interval: TimeInterval,
    event_tx: mpsc::Sender<ScanEvent>,
    mut ack_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    let mut cursor = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = store.scan(market_uid, code_uid, interval) => match result {
            Ok(cursor) => cursor,
            Err(e) => {
                let _ = event_tx.send(ScanEvent::Failed(e)).await;
                return;
            }
        },
    };

    debug!(market_uid, code_uid, "Scan cursor opened");

    loop {
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            fetched = cursor.next() => fetched,
        };
        let record = match fetched {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                let _ = event_tx.send(ScanEvent::Failed(e)).await;
                return;
            }
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            sent = event_tx.send(ScanEvent::Record(record)) => {
                if sent.is_err() {
                    return;
                }
            }
        }
        // The next record is not fetched until the consumer acknowledges.
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            ack = ack_rx.recv() => {
                if ack.is_none() {
                    return;
                }
            }
        }
    }

    let _ = event_tx.send(ScanEvent::Completed).await;
}

/// Consuming side of an open scan.
pub struct ScanHandle {
    events: mpsc::Receiver<ScanEvent>,
    ack_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
}

impl ScanHandle {
    /// Next event; `None` once the producer has gone away after a close.
    pub async fn next(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    /// Acknowledge the record most recently returned by `next()`.
    pub async fn ack(&self) {
        // A closed producer means the scan is already torn down.
        let _ = self.ack_tx.send(()).await;
    }

    /// Abort any in-flight production and release resources. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
