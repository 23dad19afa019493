//! Per-stream heartbeat liveness tracking.
//!
//! The streaming transport has no connection-level disconnect
//! notification, so liveness is application-level: a per-id task sends a
//! `Ping{id}` probe through the forwarder every interval and watches for
//! the subscriber's `Pong{id}`. `Connected` fires on the first response
//! after tracking begins or after a prior loss; `Lost` fires once
//! loss-limit consecutive probes go unanswered and ends tracking for
//! that id.

use crate::message::{PayloadMessage, StreamId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Liveness transition for one tracked id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    Connected,
    Lost,
}

/// Heartbeat tuning.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// How often a probe is sent.
    pub probe_interval: Duration,
    /// Consecutive unanswered probes before `Lost`.
    pub loss_limit: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(3),
            loss_limit: 3,
        }
    }
}

struct Peer {
    responded: Arc<AtomicBool>,
    cancel: CancellationToken,
}

/// Tracker of subscriber liveness, one probe task per tracked id.
#[derive(Clone)]
pub struct HeartbeatTracker {
    config: HeartbeatConfig,
    probe_tx: mpsc::Sender<PayloadMessage>,
    peers: Arc<DashMap<StreamId, Peer>>,
    shutdown: CancellationToken,
}

impl HeartbeatTracker {
    /// Probes ride the same publish point as data messages.
    pub fn new(config: HeartbeatConfig, probe_tx: mpsc::Sender<PayloadMessage>) -> Self {
        Self {
            config,
            probe_tx,
            peers: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Begin tracking an id, returning its live event sequence.
    pub fn track(&self, id: StreamId) -> mpsc::Receiver<HeartbeatEvent> {
        let responded = Arc::new(AtomicBool::new(false));
        let cancel = self.shutdown.child_token();
        self.peers.insert(
            id.clone(),
            Peer {
                responded: responded.clone(),
                cancel: cancel.clone(),
            },
        );

        let (event_tx, event_rx) = mpsc::channel(4);
        tokio::spawn(probe_loop(
            id,
            self.config,
            responded,
            cancel,
            self.probe_tx.clone(),
            event_tx,
            self.peers.clone(),
        ));
        event_rx
    }

    /// Record a probe response from the subscriber of `id`.
    pub fn record_pong(&self, id: &StreamId) {
        if let Some(peer) = self.peers.get(id) {
            peer.responded.store(true, Ordering::SeqCst);
        }
    }

    /// Stop tracking one id.
    pub fn untrack(&self, id: &StreamId) {
        if let Some((_, peer)) = self.peers.remove(id) {
            peer.cancel.cancel();
        }
    }

    /// Stop every probe task.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn tracked_count(&self) -> usize {
        self.peers.len()
    }
}

async fn probe_loop(
    id: StreamId,
    config: HeartbeatConfig,
    responded: Arc<AtomicBool>,
    cancel: CancellationToken,
    probe_tx: mpsc::Sender<PayloadMessage>,
    event_tx: mpsc::Sender<HeartbeatEvent>,
    peers: Arc<DashMap<StreamId, Peer>>,
) {
    let mut interval = tokio::time::interval(config.probe_interval);
    let mut misses = 0u32;
    let mut connected = false;
    let mut outstanding = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // A probe's window is one full interval: evaluate the
                // previous probe before sending the next one.
                if outstanding {
                    if responded.swap(false, Ordering::SeqCst) {
                        misses = 0;
                        if !connected {
                            connected = true;
                            debug!(%id, "Subscriber connected");
                            if event_tx.send(HeartbeatEvent::Connected).await.is_err() {
                                break;
                            }
                        }
                    } else {
                        misses += 1;
                        if misses >= config.loss_limit {
                            warn!(%id, misses, "Subscriber lost");
                            let _ = event_tx.send(HeartbeatEvent::Lost).await;
                            break;
                        }
                    }
                }
                if probe_tx.send(PayloadMessage::Ping { id: id.clone() }).await.is_err() {
                    // Forwarder gone; the service is coming down anyway.
                    break;
                }
                outstanding = true;
            }
        }
    }

    // Only clear our own registration; the id may have been re-tracked.
    peers.remove_if(&id, |_, peer| Arc::ptr_eq(&peer.responded, &responded));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn fast_config() -> HeartbeatConfig {
        HeartbeatConfig {
            probe_interval: Duration::from_millis(20),
            loss_limit: 3,
        }
    }

    #[tokio::test]
    async fn test_unanswered_probes_fire_lost_once() {
        let (probe_tx, mut probe_rx) = mpsc::channel(64);
        let tracker = HeartbeatTracker::new(fast_config(), probe_tx);
        let id = StreamId::generate();
        let mut events = tracker.track(id.clone());

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("lost within the deadline")
            .expect("event emitted");
        assert_eq!(event, HeartbeatEvent::Lost);
        // Terminal: the event channel closes, no second Lost.
        assert!(events.recv().await.is_none());

        // At least loss-limit probes went out, all for our id.
        let mut probes = 0;
        while let Ok(msg) = probe_rx.try_recv() {
            assert_eq!(msg, PayloadMessage::Ping { id: id.clone() });
            probes += 1;
        }
        assert!(probes >= 3);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_lost_waits_for_full_unanswered_windows() {
        let config = fast_config();
        let (probe_tx, _probe_rx) = mpsc::channel(64);
        let tracker = HeartbeatTracker::new(config, probe_tx);
        let mut events = tracker.track(StreamId::generate());

        let started = std::time::Instant::now();
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, HeartbeatEvent::Lost);
        // The first probe goes out immediately and gets a full interval
        // to be answered, so loss takes at least loss_limit intervals.
        assert!(started.elapsed() >= config.probe_interval * config.loss_limit);
    }

    #[tokio::test]
    async fn test_responding_subscriber_connects_then_loses() {
        let (probe_tx, mut probe_rx) = mpsc::channel(64);
        let tracker = HeartbeatTracker::new(fast_config(), probe_tx);
        let id = StreamId::generate();
        let mut events = tracker.track(id.clone());

        // Answer the first few probes, then fall silent.
        let responder = {
            let tracker = tracker.clone();
            let id = id.clone();
            tokio::spawn(async move {
                for _ in 0..3 {
                    if probe_rx.recv().await.is_none() {
                        return;
                    }
                    tracker.record_pong(&id);
                }
                // Drain remaining probes without responding.
                while probe_rx.recv().await.is_some() {}
            })
        };

        let first = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, HeartbeatEvent::Connected);

        let second = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, HeartbeatEvent::Lost);

        responder.abort();
    }

    #[tokio::test]
    async fn test_untrack_stops_probing() {
        let (probe_tx, mut probe_rx) = mpsc::channel(64);
        let tracker = HeartbeatTracker::new(fast_config(), probe_tx);
        let id = StreamId::generate();
        let mut events = tracker.track(id.clone());

        tracker.untrack(&id);
        assert_eq!(tracker.tracked_count(), 0);

        // Event stream ends without Connected or Lost.
        assert!(timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .is_none());

        // Probe traffic stops.
        tokio::time::sleep(Duration::from_millis(60)).await;
        while probe_rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(probe_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_cancels_every_task() {
        let (probe_tx, _probe_rx) = mpsc::channel(64);
        let tracker = HeartbeatTracker::new(fast_config(), probe_tx);
        let mut a = tracker.track(StreamId::generate());
        let mut b = tracker.track(StreamId::generate());

        tracker.stop();

        assert!(timeout(Duration::from_secs(1), a.recv()).await.unwrap().is_none());
        assert!(timeout(Duration::from_secs(1), b.recv()).await.unwrap().is_none());
    }
}
