//! ProbeActor - runs one probe on its own cadence
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → probe.collect(timeout) → aggregator.record → SnapshotEvent → [TopologyActor, ...]
//!     ↑
//!     └─── Commands (PollNow, UpdateInterval, Shutdown)
//! ```
//!
//! Every probe gets its own actor, so a slow cloud metadata check never holds
//! up the container listing. The first tick fires immediately, so every probe
//! collects once at startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, instrument, trace};

use crate::aggregator::LiveStateAggregator;
use crate::live::{ProbeKind, Signal};
use crate::probes::{Probe, ProbeResult};

use super::messages::ProbeCommand;

/// Actor driving a single probe
pub struct ProbeActor<P: Probe> {
    probe: P,

    /// Where results are merged
    aggregator: Arc<LiveStateAggregator>,

    command_rx: mpsc::Receiver<ProbeCommand>,

    interval_duration: Duration,

    /// Bound for one `collect` call
    timeout: Duration,
}

impl<P: Probe> ProbeActor<P> {
    pub fn new(
        probe: P,
        aggregator: Arc<LiveStateAggregator>,
        command_rx: mpsc::Receiver<ProbeCommand>,
        interval_duration: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            probe,
            aggregator,
            command_rx,
            interval_duration,
            timeout,
        }
    }

    /// Run until a Shutdown command arrives or the command channel closes
    #[instrument(skip(self), fields(probe = %self.probe.name()))]
    pub async fn run(mut self) {
        debug!("starting probe actor");

        let mut ticker = interval(self.interval_duration);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // failures are already recorded as stale data
                    let _ = self.collect().await;
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("all handles dropped, shutting down");
                        break;
                    };

                    match cmd {
                        ProbeCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let result = self.collect().await;
                            let _ = respond_to.send(result);
                        }

                        ProbeCommand::UpdateInterval { interval: new_interval } => {
                            debug!("updating interval to {new_interval:?}");
                            self.interval_duration = new_interval;
                            ticker = interval(self.interval_duration);
                        }

                        ProbeCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("probe actor stopped");
    }

    /// Collect once and merge the result, returning whether it succeeded
    async fn collect(&self) -> ProbeResult<()> {
        trace!("collecting");
        let result = self.probe.collect(self.timeout).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone());

        self.aggregator.record(result).await;
        outcome
    }
}

/// Handle for controlling a ProbeActor
#[derive(Clone)]
pub struct ProbeHandle {
    sender: mpsc::Sender<ProbeCommand>,

    /// Slot this probe feeds
    pub kind: ProbeKind,

    pub name: String,
}

impl ProbeHandle {
    /// Spawn an actor for `probe` and return its handle
    pub fn spawn<P: Probe>(
        probe: P,
        aggregator: Arc<LiveStateAggregator>,
        interval_duration: Duration,
        timeout: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let name = probe.name().to_string();
        let actor = ProbeActor::new(probe, aggregator, cmd_rx, interval_duration, timeout);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            kind: <P::Output as Signal>::KIND,
            name,
        }
    }

    /// Collect immediately; errors if the probe was unavailable
    pub async fn poll_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ProbeCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    pub async fn update_interval(&self, interval: Duration) -> Result<()> {
        anyhow::ensure!(!interval.is_zero(), "probe interval must be positive");
        self.sender
            .send(ProbeCommand::UpdateInterval { interval })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ProbeCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
