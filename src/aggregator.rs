//! Live state aggregator
//!
//! Holds the most recent successful result of every probe and hands out
//! consistent snapshots.
//!
//! ## Consistency
//!
//! Each probe owns one slot. A probe result never edits the current snapshot
//! in place: the writer clones it, replaces its own slot and swaps the new
//! `Arc<LiveSnapshot>` in. Readers only ever clone the `Arc`, so they always
//! see a fully formed snapshot.
//!
//! ## Staleness
//!
//! A failed attempt keeps the last known-good data, records the error and
//! flags the slot stale. `lastUpdate` keeps pointing at the last success.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, trace, warn};

use crate::actors::messages::SnapshotEvent;
use crate::live::{LiveSnapshot, Signal};
use crate::probes::ProbeResult;

pub struct LiveStateAggregator {
    /// Current snapshot, replaced wholesale on every write
    current: RwLock<Arc<LiveSnapshot>>,

    /// Notifies subscribers that a new snapshot is available
    event_tx: broadcast::Sender<SnapshotEvent>,
}

impl LiveStateAggregator {
    pub fn new(event_tx: broadcast::Sender<SnapshotEvent>) -> Self {
        Self {
            current: RwLock::new(Arc::new(LiveSnapshot::default())),
            event_tx,
        }
    }

    /// Merge one probe result into a new snapshot
    pub async fn record<S: Signal>(&self, result: ProbeResult<S>) {
        let now = Utc::now();

        let event = {
            let mut current = self.current.write().await;
            let mut next = LiveSnapshot::clone(&current);
            next.generated_at = now;

            let slot = S::slot(&mut next);
            let event = match result {
                Ok(data) => {
                    trace!("{}: recorded fresh result", S::KIND);
                    slot.record_success(data, now);
                    SnapshotEvent {
                        probe: S::KIND,
                        success: true,
                        error_message: None,
                        timestamp: now,
                    }
                }
                Err(e) => {
                    warn!("{}: probe unavailable, keeping last known data: {}", S::KIND, e);
                    slot.record_failure(e.to_string(), now);
                    SnapshotEvent {
                        probe: S::KIND,
                        success: false,
                        error_message: Some(e.to_string()),
                        timestamp: now,
                    }
                }
            };

            *current = Arc::new(next);
            event
        };

        match self.event_tx.send(event) {
            Ok(num_receivers) => {
                trace!("published snapshot event to {num_receivers} receivers");
            }
            Err(_) => {
                debug!("no receivers for snapshot event");
            }
        }
    }

    /// The current snapshot
    pub async fn snapshot(&self) -> Arc<LiveSnapshot> {
        self.current.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.event_tx.subscribe()
    }
}
