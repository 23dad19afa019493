//! Concurrency-safe registry of open streams.
//!
//! The single shared mutable structure in the streaming core. An entry's
//! existence is the source of truth for "stream is known"; every
//! multi-step update happens inside one critical section so concurrent
//! close/attach/remove operations never lose an update or double-release
//! a resource.

use crate::message::StreamId;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tradecast_store::ScanHandle;

/// Registry entry for one stream.
pub struct StreamEntry {
    /// Present from registration until the publish loop takes it.
    pub scanner: Option<ScanHandle>,
    /// Present once the stream starts publishing. Set at most once.
    pub cancel: Option<CancellationToken>,
}

impl StreamEntry {
    /// Release whatever the entry still owns. Safe to call on entries in
    /// any state; cancellation is idempotent.
    pub fn release(self) {
        if let Some(cancel) = self.cancel {
            cancel.cancel();
        }
        if let Some(scanner) = self.scanner {
            scanner.close();
        }
    }
}

/// Mutex-guarded map of open streams.
#[derive(Default)]
pub struct StreamRegistry {
    streams: Mutex<HashMap<StreamId, StreamEntry>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened stream with no cancel handle yet.
    pub fn register(&self, id: StreamId, scanner: ScanHandle) {
        self.streams.lock().insert(
            id,
            StreamEntry {
                scanner: Some(scanner),
                cancel: None,
            },
        );
    }

    /// Transition a stream to publishing: take its scanner and attach a
    /// fresh cancel token, atomically.
    ///
    /// Returns `None` if the stream is unknown or already publishing, so
    /// the handle can only ever be attached once.
    pub fn begin_publishing(&self, id: &StreamId) -> Option<(ScanHandle, CancellationToken)> {
        let mut streams = self.streams.lock();
        let entry = streams.get_mut(id)?;
        if entry.cancel.is_some() {
            return None;
        }
        let scanner = entry.scanner.take()?;
        let cancel = CancellationToken::new();
        entry.cancel = Some(cancel.clone());
        Some((scanner, cancel))
    }

    /// Remove a stream, handing its entry back for release.
    pub fn remove(&self, id: &StreamId) -> Option<StreamEntry> {
        self.streams.lock().remove(id)
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.streams.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Take every entry out, for shutdown.
    pub fn drain(&self) -> Vec<(StreamId, StreamEntry)> {
        self.streams.lock().drain().collect()
    }
}
