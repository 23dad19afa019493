//! Prometheus metrics for the ingestion pipeline and streaming service.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, register_int_gauge,
    CounterVec, Histogram, IntCounter, IntGauge,
};

/// Total trades persisted.
pub static TRADES_PERSISTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tradecast_trades_persisted_total", "Total trades persisted").unwrap()
});

/// Total trades rejected by the pipeline.
/// Labels: cause (validation/serialization/resolution/storage_write/internal)
pub static TRADES_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradecast_trades_rejected_total",
        "Total trades rejected by the ingestion pipeline",
        &["cause"]
    )
    .unwrap()
});

/// End-to-end ingestion latency in milliseconds.
pub static INGEST_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tradecast_ingest_latency_ms",
        "Latency from submission to resolved reaction in milliseconds",
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0]
    )
    .unwrap()
});

/// Total streams opened.
pub static STREAMS_OPENED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tradecast_streams_opened_total", "Total streams opened").unwrap()
});

/// Total streams closed by reason.
/// Labels: reason (completed/broken/requested/subscriber_lost/shutdown)
pub static STREAMS_CLOSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradecast_streams_closed_total",
        "Total streams closed",
        &["reason"]
    )
    .unwrap()
});

/// Currently open streams.
pub static STREAMS_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tradecast_streams_open", "Currently open streams").unwrap()
});

/// Total messages published on the data channel by type.
/// Labels: kind (trades/completed/broken/ping)
pub static MESSAGES_PUBLISHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradecast_messages_published_total",
        "Total messages published on the data channel",
        &["kind"]
    )
    .unwrap()
});

/// Total subscribers declared lost by the heartbeat tracker.
pub static HEARTBEAT_LOSSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tradecast_heartbeat_losses_total",
        "Total subscribers declared lost by the heartbeat tracker"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a persisted trade.
    pub fn trade_persisted() {
        TRADES_PERSISTED_TOTAL.inc();
    }

    /// Record a rejected trade.
    pub fn trade_rejected(cause: &str) {
        TRADES_REJECTED_TOTAL.with_label_values(&[cause]).inc();
    }

    /// Record ingestion latency.
    pub fn ingest_latency(latency_ms: f64) {
        INGEST_LATENCY_MS.observe(latency_ms);
    }

    /// Record a stream opened.
    pub fn stream_opened() {
        STREAMS_OPENED_TOTAL.inc();
        STREAMS_OPEN.inc();
    }

    /// Record a stream closed.
    pub fn stream_closed(reason: &str) {
        STREAMS_CLOSED_TOTAL.with_label_values(&[reason]).inc();
        STREAMS_OPEN.dec();
    }

    /// Record a published data message.
    pub fn message_published(kind: &str) {
        MESSAGES_PUBLISHED_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a subscriber loss.
    pub fn heartbeat_loss() {
        HEARTBEAT_LOSSES_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_updates_counters() {
        let before = TRADES_PERSISTED_TOTAL.get();
        Metrics::trade_persisted();
        assert_eq!(TRADES_PERSISTED_TOTAL.get(), before + 1);

        let before = TRADES_REJECTED_TOTAL.with_label_values(&["validation"]).get();
        Metrics::trade_rejected("validation");
        assert_eq!(
            TRADES_REJECTED_TOTAL.with_label_values(&["validation"]).get(),
            before + 1.0
        );
    }

    #[test]
    fn test_stream_gauge_tracks_open_and_close() {
        let before = STREAMS_OPEN.get();
        Metrics::stream_opened();
        Metrics::stream_opened();
        Metrics::stream_closed("completed");
        assert_eq!(STREAMS_OPEN.get(), before + 1);
    }
}
