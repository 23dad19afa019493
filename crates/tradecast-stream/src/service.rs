//! Streaming service orchestration.
//!
//! Ties the pieces together: the control endpoint opens and closes
//! streams, the registry tracks them, the heartbeat tracker gates
//! publishing on subscriber liveness, and the publish loop drains an
//! acknowledged scanner into the shared data channel. A stream closes
//! itself after its terminal message, on subscriber loss, or on an
//! explicit close request; all three paths converge on the same
//! idempotent removal.

use crate::error::{StreamError, StreamResult};
use crate::heartbeat::{HeartbeatEvent, HeartbeatTracker};
use crate::message::{ControlReply, ControlRequest, PayloadMessage, StreamId};
use crate::registry::StreamRegistry;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tradecast_core::TimeInterval;
use tradecast_telemetry::Metrics;
use tradecast_resolver::ResolverPool;
use tradecast_store::{ScanEvent, ScanHandle, TradeScanner, TradeStore};

struct Inner {
    registry: StreamRegistry,
    heartbeat: HeartbeatTracker,
    store: Arc<dyn TradeStore>,
    resolver: ResolverPool,
    publish_tx: mpsc::Sender<PayloadMessage>,
    shutdown: CancellationToken,
}

/// Cheaply cloneable handle over the streaming core.
#[derive(Clone)]
pub struct StreamingService {
    inner: Arc<Inner>,
}

impl StreamingService {
    pub fn new(
        store: Arc<dyn TradeStore>,
        resolver: ResolverPool,
        heartbeat: HeartbeatTracker,
        publish_tx: mpsc::Sender<PayloadMessage>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: StreamRegistry::new(),
                heartbeat,
                store,
                resolver,
                publish_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Token cancelled by `shutdown()`; shared with the transport layer.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn open_streams(&self) -> usize {
        self.inner.registry.len()
    }

    /// Open a stream over the stored range for (market, code, interval).
    ///
    /// The scanner starts immediately but nothing is published until the
    /// heartbeat tracker reports the subscriber alive.
    pub async fn open_stream(
        &self,
        market: &str,
        code: &str,
        interval: TimeInterval,
    ) -> StreamResult<StreamId> {
        let market_uid = self.resolve(market).await?;
        let code_uid = self.resolve(code).await?;

        let scanner =
            TradeScanner::new(self.inner.store.clone(), market_uid, code_uid, interval).open();
        let id = StreamId::generate();
        self.inner.registry.register(id.clone(), scanner);
        let events = self.inner.heartbeat.track(id.clone());
        info!(%id, market, code, %interval, "Stream opened");
        Metrics::stream_opened();

        tokio::spawn(supervise(self.clone(), id.clone(), events));
        Ok(id)
    }

    /// Close a stream. Returns whether this call did the closing; a
    /// repeat close or an unknown id is a quiet no-op.
    pub fn close_stream(&self, id: &StreamId) -> bool {
        self.close_with_reason(id, "requested")
    }

    fn close_with_reason(&self, id: &StreamId, reason: &str) -> bool {
        match self.inner.registry.remove(id) {
            Some(entry) => {
                entry.release();
                self.inner.heartbeat.untrack(id);
                info!(%id, reason, "Stream closed");
                Metrics::stream_closed(reason);
                true
            }
            None => {
                debug!(%id, "Close for unknown stream ignored");
                false
            }
        }
    }

    /// Best-effort teardown of every open stream.
    pub fn shutdown(&self) {
        let drained = self.inner.registry.drain();
        info!(streams = drained.len(), "Streaming service shutting down");
        for (id, entry) in drained {
            entry.release();
            self.inner.heartbeat.untrack(&id);
            Metrics::stream_closed("shutdown");
        }
        self.inner.heartbeat.stop();
        self.inner.shutdown.cancel();
    }

    /// Serve control requests until shutdown. An accept failure on the
    /// shared socket is fatal.
    pub async fn run_control(&self, listener: TcpListener) -> StreamResult<()> {
        loop {
            tokio::select! {
                biased;
                () = self.inner.shutdown.cancelled() => {
                    debug!("Control endpoint shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = accepted
                        .map_err(|e| StreamError::Transport(format!("accept: {e}")))?;
                    debug!(%peer, "Control connection accepted");
                    tokio::spawn(self.clone().serve_control(socket));
                }
            }
        }
    }

    async fn serve_control(self, socket: TcpStream) {
        let (read_half, write_half) = socket.into_split();
        let mut writer = FramedWrite::new(write_half, LinesCodec::new());
        let mut reader = FramedRead::new(read_half, LinesCodec::new());

        loop {
            let line = tokio::select! {
                biased;
                () = self.inner.shutdown.cancelled() => return,
                line = reader.next() => match line {
                    Some(Ok(line)) => line,
                    Some(Err(_)) | None => return,
                },
            };

            let reply = match serde_json::from_str::<ControlRequest>(&line) {
                Ok(ControlRequest::OpenStream {
                    market,
                    code,
                    interval,
                }) => match self.open_stream(&market, &code, interval).await {
                    Ok(id) => Some(ControlReply::StreamOpened { id }),
                    Err(error) => {
                        warn!(%error, market, code, "Open stream request failed");
                        Some(ControlReply::StreamRejected {
                            reason: error.to_string(),
                        })
                    }
                },
                Ok(ControlRequest::CloseStream { id }) => {
                    self.close_stream(&id);
                    Some(ControlReply::StreamClosed {})
                }
                Err(error) => {
                    warn!(%error, "Ignoring unrecognized control message");
                    None
                }
            };

            if let Some(reply) = reply {
                let encoded = match serde_json::to_string(&reply) {
                    Ok(encoded) => encoded,
                    Err(error) => {
                        warn!(%error, "Failed to encode control reply");
                        continue;
                    }
                };
                if writer.send(encoded).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn resolve(&self, token: &str) -> StreamResult<u32> {
        self.inner
            .resolver
            .resolve(token)
            .await
            .map_err(|source| StreamError::Resolution {
                token: token.to_string(),
                source,
            })
    }

    async fn publish(&self, message: PayloadMessage) -> StreamResult<()> {
        self.inner
            .publish_tx
            .send(message)
            .await
            .map_err(|_| StreamError::Transport("publish channel closed".to_string()))
    }
}

/// Follow one stream's liveness: start publishing on the first
/// `Connected`, close the stream on `Lost`.
async fn supervise(
    service: StreamingService,
    id: StreamId,
    mut events: mpsc::Receiver<HeartbeatEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            HeartbeatEvent::Connected => {
                if let Some((scanner, cancel)) = service.inner.registry.begin_publishing(&id) {
                    tokio::spawn(publish_loop(service.clone(), id.clone(), scanner, cancel));
                }
            }
            HeartbeatEvent::Lost => {
                warn!(%id, "Subscriber lost, closing stream");
                Metrics::heartbeat_loss();
                service.close_with_reason(&id, "subscriber_lost");
                return;
            }
        }
    }
}

/// Drain the scanner into the data channel, one acknowledged record at a
/// time, then close the stream.
async fn publish_loop(
    service: StreamingService,
    id: StreamId,
    mut scanner: ScanHandle,
    cancel: CancellationToken,
) {
    let mut reason = "cancelled";
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = scanner.next() => event,
        };
        match event {
            Some(ScanEvent::Record(payload)) => {
                if service
                    .publish(PayloadMessage::Trades { payload })
                    .await
                    .is_err()
                {
                    break;
                }
                scanner.ack().await;
            }
            Some(ScanEvent::Completed) => {
                debug!(%id, "Stream range exhausted");
                let _ = service.publish(PayloadMessage::Completed {}).await;
                reason = "completed";
                break;
            }
            Some(ScanEvent::Failed(error)) => {
                warn!(%id, %error, "Scan failed mid-stream");
                let _ = service
                    .publish(PayloadMessage::Broken {
                        reason: error.to_string(),
                    })
                    .await;
                reason = "broken";
                break;
            }
            None => break,
        }
    }
    service.close_with_reason(&id, reason);
}
