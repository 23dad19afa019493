//! The ingestion pipeline orchestrator.
//!
//! Per request: build a draft (pure), resolve market and code uids
//! concurrently through the bounded resolver pool, enrich + serialize,
//! then perform the single durable put. The outcome travels through a
//! oneshot channel, so it is structurally impossible to resolve a
//! request twice.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use tradecast_telemetry::Metrics;
use tradecast_core::{
    enrich, serialize, DraftTrade, Fault, Reaction, RejectCause, TradePayload, TradeReaction,
};
use tradecast_resolver::ResolverPool;
use tradecast_store::{TradePut, TradeStore};

/// Pending outcome of one submitted trade.
///
/// Resolves exactly once. If the worker task vanishes the ticket still
/// resolves, to a rejection carrying an internal fault.
pub struct TradeTicket {
    rx: oneshot::Receiver<TradeReaction>,
}

impl TradeTicket {
    pub async fn outcome(self) -> TradeReaction {
        match self.rx.await {
            Ok(reaction) => reaction,
            Err(_) => TradeReaction::Rejected(vec![RejectCause::Internal(Fault::new(
                "ingestion worker terminated before resolving",
            ))]),
        }
    }
}

/// Ingestion pipeline over injected resolver and store handles.
#[derive(Clone)]
pub struct TradePipeline {
    resolver: ResolverPool,
    store: Arc<dyn TradeStore>,
}

impl TradePipeline {
    pub fn new(resolver: ResolverPool, store: Arc<dyn TradeStore>) -> Self {
        Self { resolver, store }
    }

    /// The bounded resolver pool this pipeline resolves through.
    pub fn resolver(&self) -> &ResolverPool {
        &self.resolver
    }

    /// Issue an ingestion request without waiting for it.
    pub fn submit(&self, payload: TradePayload) -> TradeTicket {
        let (tx, rx) = oneshot::channel();
        let pipeline = self.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let reaction = pipeline.ingest(payload).await;
            Metrics::ingest_latency(started.elapsed().as_secs_f64() * 1000.0);
            match &reaction {
                TradeReaction::Persisted(_) => Metrics::trade_persisted(),
                TradeReaction::Rejected(causes) => {
                    let summary: Vec<String> = causes.iter().map(|c| c.to_string()).collect();
                    warn!(causes = ?summary, "Trade rejected");
                    for cause in causes {
                        Metrics::trade_rejected(cause.kind());
                    }
                }
            }
            // The submitter may have dropped the ticket; that is fine.
            let _ = tx.send(reaction);
        });
        TradeTicket { rx }
    }

    /// Submit and wait for the reaction.
    pub async fn add_trade(&self, payload: TradePayload) -> TradeReaction {
        self.submit(payload).outcome().await
    }

    async fn ingest(&self, payload: TradePayload) -> TradeReaction {
        let draft = DraftTrade::new(payload.clone());

        // Resolve both tokens concurrently; if both fail, both causes are
        // reported rather than the first alone.
        let (market_res, code_res) = tokio::join!(
            self.resolver.resolve(&payload.market),
            self.resolver.resolve(&payload.code),
        );

        let mut resolution_causes = Vec::new();
        let market_uid = market_res.unwrap_or_else(|e| {
            resolution_causes.push(RejectCause::resolution(&payload.market, e));
            0
        });
        let code_uid = code_res.unwrap_or_else(|e| {
            resolution_causes.push(RejectCause::resolution(&payload.code, e));
            0
        });
        if !resolution_causes.is_empty() {
            return TradeReaction::Rejected(resolution_causes);
        }

        let binary = match enrich(draft, market_uid, code_uid).and_then(serialize) {
            Reaction::Accepted(binary) => binary,
            Reaction::Rejected(causes) => return TradeReaction::Rejected(causes),
        };

        match self.store.put(TradePut::from_binary(binary)).await {
            Ok(()) => {
                debug!(
                    market = %payload.market,
                    code = %payload.code,
                    ts = %payload.timestamp,
                    "Trade persisted"
                );
                TradeReaction::Persisted(payload)
            }
            Err(e) => TradeReaction::Rejected(vec![RejectCause::storage_write(e)]),
        }
    }
}
