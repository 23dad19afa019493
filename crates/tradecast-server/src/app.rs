//! Application wiring and the main run loop.
//!
//! Builds the shared store, the resolver pool, the ingestion pipeline
//! and the streaming service from one `AppConfig`, then serves three
//! TCP endpoints until a shutdown signal arrives. A failure on any
//! shared socket takes the whole application down; per-connection
//! failures only end that connection.

use crate::api::{IngestReply, IngestRequest};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tradecast_ingest::TradePipeline;
use tradecast_resolver::{HttpResolver, ResolverPool, StaticResolver, UidResolver};
use tradecast_store::{MemoryStore, TradeStore};
use tradecast_stream::{
    Forwarder, HeartbeatConfig, HeartbeatTracker, StreamError, StreamResult, StreamingService,
};

const PUBLISH_CHANNEL_CAPACITY: usize = 256;

/// The wired application.
pub struct Application {
    config: AppConfig,
    store: Arc<dyn TradeStore>,
    pipeline: TradePipeline,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn TradeStore> = Arc::new(MemoryStore::new());

        let inner: Arc<dyn UidResolver> = match &config.resolver.url {
            Some(url) => {
                info!(%url, "Using remote uid resolver");
                Arc::new(HttpResolver::new(url.clone())?)
            }
            None => {
                info!(
                    tokens = config.resolver.tokens.len(),
                    "Using static uid resolver"
                );
                Arc::new(StaticResolver::with_tokens(
                    config.resolver.tokens.clone(),
                ))
            }
        };
        let resolver = ResolverPool::new(inner, config.resolver.pool_capacity);
        let pipeline = TradePipeline::new(resolver, store.clone());

        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    /// Run until ctrl-c or a fatal transport failure.
    pub async fn run(self) -> AppResult<()> {
        let ingest_addr = self.config.ingest_socket_addr()?;
        let control_addr = self.config.control_socket_addr()?;
        let data_addr = self.config.data_socket_addr()?;

        let (publish_tx, publish_rx) = mpsc::channel(PUBLISH_CHANNEL_CAPACITY);
        let heartbeat = HeartbeatTracker::new(
            HeartbeatConfig {
                probe_interval: Duration::from_millis(self.config.heartbeat.probe_interval_ms),
                loss_limit: self.config.heartbeat.loss_limit,
            },
            publish_tx.clone(),
        );

        // The streaming side shares the pipeline's resolver pool.
        let resolver = self.pipeline.resolver().clone();
        let service = StreamingService::new(
            self.store.clone(),
            resolver,
            heartbeat.clone(),
            publish_tx,
        );
        let shutdown = service.shutdown_token();

        let forwarder = Forwarder::bind(data_addr).await?;
        let control_listener = TcpListener::bind(control_addr).await?;
        let ingest_listener = TcpListener::bind(ingest_addr).await?;
        info!(
            ingest = %ingest_listener.local_addr()?,
            control = %control_listener.local_addr()?,
            data = %forwarder.local_addr(),
            "Endpoints bound"
        );

        let mut forwarder_task: JoinHandle<StreamResult<()>> =
            tokio::spawn(forwarder.run(publish_rx, heartbeat, shutdown.clone()));
        let mut control_task: JoinHandle<StreamResult<()>> = tokio::spawn({
            let service = service.clone();
            async move { service.run_control(control_listener).await }
        });
        let mut ingest_task: JoinHandle<StreamResult<()>> = tokio::spawn(run_ingest(
            self.pipeline.clone(),
            ingest_listener,
            shutdown.clone(),
        ));

        let outcome = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
            result = &mut forwarder_task => flatten("data endpoint", result),
            result = &mut control_task => flatten("control endpoint", result),
            result = &mut ingest_task => flatten("ingest endpoint", result),
        };

        if let Err(error) = &outcome {
            error!(%error, "Fatal endpoint failure, shutting down");
        }

        // Best effort: release every stream, stop probes, cancel tasks.
        service.shutdown();
        for task in [forwarder_task, control_task, ingest_task] {
            task.abort();
        }

        outcome.map_err(AppError::from)
    }
}

fn flatten(
    endpoint: &str,
    result: Result<StreamResult<()>, tokio::task::JoinError>,
) -> StreamResult<()> {
    match result {
        Ok(result) => result,
        Err(join_error) => Err(StreamError::Transport(format!(
            "{endpoint} task failed: {join_error}"
        ))),
    }
}

/// Serve ingestion requests until shutdown. Accept failures on the
/// shared socket are fatal.
async fn run_ingest(
    pipeline: TradePipeline,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> StreamResult<()> {
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!("Ingest endpoint shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, peer) = accepted
                    .map_err(|e| StreamError::Transport(format!("accept: {e}")))?;
                debug!(%peer, "Ingest connection accepted");
                tokio::spawn(serve_ingest(pipeline.clone(), socket, shutdown.clone()));
            }
        }
    }
}

async fn serve_ingest(pipeline: TradePipeline, socket: TcpStream, shutdown: CancellationToken) {
    let (read_half, write_half) = socket.into_split();
    let mut writer = FramedWrite::new(write_half, LinesCodec::new());
    let mut reader = FramedRead::new(read_half, LinesCodec::new());

    loop {
        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => return,
            line = reader.next() => match line {
                Some(Ok(line)) => line,
                Some(Err(_)) | None => return,
            },
        };

        let reply = match serde_json::from_str::<IngestRequest>(&line) {
            Ok(IngestRequest::AddTrade { payload }) => {
                IngestReply::from(pipeline.add_trade(payload).await)
            }
            Err(error) => {
                warn!(%error, "Ignoring unrecognized ingest message");
                continue;
            }
        };

        let encoded = match serde_json::to_string(&reply) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(%error, "Failed to encode ingest reply");
                continue;
            }
        };
        if writer.send(encoded).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;
    use tradecast_core::{TradePayload, TradeSide};

    fn pipeline() -> TradePipeline {
        let resolver = ResolverPool::with_default_capacity(Arc::new(
            StaticResolver::with_tokens([("RTS".to_string(), 7), ("FT".to_string(), 12)]),
        ));
        TradePipeline::new(resolver, Arc::new(MemoryStore::new()))
    }

    fn payload(market: &str) -> TradePayload {
        TradePayload::new(
            market,
            "FT",
            Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
            dec!(250.75),
            dec!(4),
            TradeSide::Buy,
        )
    }

    async fn request(socket: &mut TcpStream, request: &IngestRequest) -> IngestReply {
        let line = serde_json::to_string(request).unwrap();
        socket.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        let (read_half, _) = socket.split();
        let mut lines = BufReader::new(read_half).lines();
        let reply = timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_endpoint_persists_and_rejects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(run_ingest(pipeline(), listener, shutdown.clone()));

        let mut socket = TcpStream::connect(addr).await.unwrap();

        let reply = request(
            &mut socket,
            &IngestRequest::AddTrade {
                payload: payload("RTS"),
            },
        )
        .await;
        assert!(matches!(reply, IngestReply::TradePersisted { .. }));

        let reply = request(
            &mut socket,
            &IngestRequest::AddTrade {
                payload: payload("NOPE"),
            },
        )
        .await;
        match reply {
            IngestReply::TradeRejected { causes } => assert_eq!(causes.len(), 1),
            other => panic!("unexpected reply: {other:?}"),
        }

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_application_builds_from_default_config() {
        let mut config = AppConfig::default();
        config.resolver.tokens.insert("RTS".to_string(), 7);
        let app = Application::new(config).unwrap();
        assert!(app
            .pipeline
            .resolver()
            .resolve("RTS")
            .await
            .is_ok());
    }
}
