//! Pub/sub forwarder for the data channel.
//!
//! One TCP endpoint, any number of subscribers. Every message published
//! by a stream's publish loop (or a heartbeat probe) is fanned out to
//! every connected subscriber as one JSON line. Subscribers may write
//! lines back on the same connection; the only recognized inbound
//! message is the heartbeat `pong`, which is fed to the liveness
//! tracker. A failure on the shared socket is fatal to the forwarder.

use crate::error::{StreamError, StreamResult};
use crate::heartbeat::HeartbeatTracker;
use crate::message::{PayloadMessage, SubscriberMessage};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tradecast_telemetry::Metrics;

const FANOUT_CAPACITY: usize = 1024;

/// Fan-out point for the data channel.
pub struct Forwarder {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Forwarder {
    /// Bind the data endpoint. A bind failure is fatal.
    pub async fn bind(addr: SocketAddr) -> StreamResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StreamError::Transport(format!("bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        info!(%local_addr, "Data endpoint listening");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until the inbound channel closes or `shutdown` fires.
    ///
    /// Returns an error only on a shared-socket failure; the caller is
    /// expected to treat that as fatal and bring the service down.
    pub async fn run(
        self,
        mut inbound: mpsc::Receiver<PayloadMessage>,
        tracker: HeartbeatTracker,
        shutdown: CancellationToken,
    ) -> StreamResult<()> {
        let (fanout_tx, _) = broadcast::channel::<String>(FANOUT_CAPACITY);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!("Forwarder shutting down");
                    return Ok(());
                }
                message = inbound.recv() => {
                    match message {
                        Some(message) => {
                            Metrics::message_published(message_kind(&message));
                            let line = serde_json::to_string(&message)?;
                            // Lagged or absent subscribers are not an error.
                            let _ = fanout_tx.send(line);
                        }
                        None => {
                            debug!("Publish channel closed, forwarder stopping");
                            return Ok(());
                        }
                    }
                }
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted
                        .map_err(|e| StreamError::Transport(format!("accept: {e}")))?;
                    debug!(%peer, "Subscriber connected");
                    tokio::spawn(serve_subscriber(
                        socket,
                        fanout_tx.subscribe(),
                        tracker.clone(),
                        shutdown.clone(),
                    ));
                }
            }
        }
    }
}

fn message_kind(message: &PayloadMessage) -> &'static str {
    match message {
        PayloadMessage::Trades { .. } => "trades",
        PayloadMessage::Completed {} => "completed",
        PayloadMessage::Broken { .. } => "broken",
        PayloadMessage::Ping { .. } => "ping",
    }
}

async fn serve_subscriber(
    socket: TcpStream,
    mut fanout: broadcast::Receiver<String>,
    tracker: HeartbeatTracker,
    shutdown: CancellationToken,
) {
    let (read_half, write_half) = socket.into_split();
    let mut writer = FramedWrite::new(write_half, LinesCodec::new());
    let mut reader = FramedRead::new(read_half, LinesCodec::new());

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            outbound = fanout.recv() => {
                match outbound {
                    Ok(line) => {
                        if writer.send(line).await.is_err() {
                            // Subscriber hung up; heartbeats notice the silence.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Slow subscriber dropped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = reader.next() => {
                match inbound {
                    Some(Ok(line)) => match serde_json::from_str::<SubscriberMessage>(&line) {
                        Ok(SubscriberMessage::Pong { id }) => tracker.record_pong(&id),
                        Err(error) => {
                            warn!(%error, "Ignoring unrecognized subscriber message");
                        }
                    },
                    Some(Err(_)) | None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatConfig;
    use crate::message::StreamId;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;

    async fn start_forwarder() -> (
        SocketAddr,
        mpsc::Sender<PayloadMessage>,
        HeartbeatTracker,
        CancellationToken,
    ) {
        let forwarder = Forwarder::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = forwarder.local_addr();
        let (publish_tx, publish_rx) = mpsc::channel(64);
        let tracker = HeartbeatTracker::new(HeartbeatConfig::default(), publish_tx.clone());
        let shutdown = CancellationToken::new();
        tokio::spawn(forwarder.run(publish_rx, tracker.clone(), shutdown.clone()));
        (addr, publish_tx, tracker, shutdown)
    }

    #[tokio::test]
    async fn test_published_messages_reach_every_subscriber() {
        let (addr, publish_tx, _tracker, shutdown) = start_forwarder().await;

        let first = TcpStream::connect(addr).await.unwrap();
        let second = TcpStream::connect(addr).await.unwrap();
        // Give the accept loop a beat before publishing.
        tokio::time::sleep(Duration::from_millis(50)).await;

        publish_tx
            .send(PayloadMessage::Completed {})
            .await
            .unwrap();

        for socket in [first, second] {
            let mut lines = BufReader::new(socket).lines();
            let line = timeout(Duration::from_secs(1), lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(line, r#"{"type":"completed"}"#);
        }
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_pong_reaches_the_tracker() {
        let (addr, publish_tx, tracker, shutdown) = start_forwarder().await;
        let id = StreamId::generate();
        let mut events = tracker.track(id.clone());

        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(format!("{{\"type\":\"pong\",\"id\":\"{id}\"}}\n").as_bytes())
            .await
            .unwrap();
        socket.flush().await.unwrap();

        // The default probe interval is seconds; drive the connect
        // transition by reading the tracker state through its event.
        let connected = timeout(Duration::from_secs(10), events.recv()).await;
        assert_eq!(connected.unwrap(), Some(crate::heartbeat::HeartbeatEvent::Connected));

        drop(publish_tx);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_closing_the_publish_channel_stops_the_forwarder() {
        let forwarder = Forwarder::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let (publish_tx, publish_rx) = mpsc::channel::<PayloadMessage>(8);
        // The tracker gets its own probe channel; a tracker sharing
        // `publish_tx` would keep the inbound side open forever.
        let (probe_tx, _probe_rx) = mpsc::channel(8);
        let tracker = HeartbeatTracker::new(HeartbeatConfig::default(), probe_tx);
        let task = tokio::spawn(forwarder.run(publish_rx, tracker, CancellationToken::new()));

        drop(publish_tx);
        let outcome = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(outcome.is_ok());
    }
}
