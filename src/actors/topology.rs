//! TopologyActor - rebuilds the topology whenever live state changes
//!
//! ## Message Flow
//!
//! ```text
//! SnapshotEvent → aggregator.snapshot() → build_topology → latest Arc<TopologyGraph>
//!                                                              ↑
//!     Commands (GetTopology, UpdateArchitecture, Shutdown) ────┘
//! ```
//!
//! The actor owns the declared architecture. Replacing it swaps the whole
//! document and rebuilds right away.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::aggregator::LiveStateAggregator;
use crate::architecture::ArchitectureDocument;
use crate::layout::LayoutConfig;
use crate::topology::{TopologyGraph, build_topology};

use super::messages::{SnapshotEvent, TopologyCommand};

pub struct TopologyActor {
    document: ArchitectureDocument,

    /// Used when the document carries no layout settings
    layout_config: LayoutConfig,

    aggregator: Arc<LiveStateAggregator>,

    /// Result of the last pass
    latest: Option<Arc<TopologyGraph>>,

    command_rx: mpsc::Receiver<TopologyCommand>,

    snapshot_rx: broadcast::Receiver<SnapshotEvent>,
}

impl TopologyActor {
    pub fn new(
        document: ArchitectureDocument,
        layout_config: LayoutConfig,
        aggregator: Arc<LiveStateAggregator>,
        command_rx: mpsc::Receiver<TopologyCommand>,
    ) -> Self {
        let snapshot_rx = aggregator.subscribe();
        Self {
            document,
            layout_config,
            aggregator,
            latest: None,
            command_rx,
            snapshot_rx,
        }
    }

    #[instrument(skip(self), fields(nodes = self.document.nodes.len()))]
    pub async fn run(mut self) {
        debug!("starting topology actor");

        loop {
            tokio::select! {
                result = self.snapshot_rx.recv() => {
                    match result {
                        Ok(event) => {
                            trace!("{} snapshot changed (success: {})", event.probe, event.success);
                            self.rebuild().await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // the snapshot is cumulative, one rebuild covers everything missed
                            warn!("topology actor lagged, skipped {skipped} snapshot events");
                            self.rebuild().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("snapshot channel closed, shutting down");
                            break;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("all handles dropped, shutting down");
                        break;
                    };

                    match cmd {
                        TopologyCommand::GetTopology { respond_to } => {
                            let topology = match &self.latest {
                                Some(latest) => latest.clone(),
                                None => self.rebuild().await,
                            };
                            let _ = respond_to.send(topology);
                        }

                        TopologyCommand::UpdateArchitecture { document, respond_to } => {
                            debug!(
                                "replacing architecture: {} nodes, {} edges",
                                document.nodes.len(),
                                document.edges.len()
                            );
                            for issue in document.validate() {
                                warn!("architecture: {issue}");
                            }
                            self.document = document;
                            let topology = self.rebuild().await;
                            let _ = respond_to.send(topology);
                        }

                        TopologyCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("topology actor stopped");
    }

    async fn rebuild(&mut self) -> Arc<TopologyGraph> {
        let snapshot = self.aggregator.snapshot().await;
        let topology = Arc::new(build_topology(
            &self.document,
            &snapshot,
            &self.layout_config,
        ));
        self.latest = Some(topology.clone());
        topology
    }
}

/// Handle for querying and updating the TopologyActor
#[derive(Clone)]
pub struct TopologyHandle {
    sender: mpsc::Sender<TopologyCommand>,
}

impl TopologyHandle {
    pub fn spawn(
        document: ArchitectureDocument,
        layout_config: LayoutConfig,
        aggregator: Arc<LiveStateAggregator>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = TopologyActor::new(document, layout_config, aggregator, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Latest topology
    pub async fn topology(&self) -> Result<Arc<TopologyGraph>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(TopologyCommand::GetTopology { respond_to: tx })
            .await
            .context("failed to send GetTopology command")?;

        rx.await.context("failed to receive topology")
    }

    /// Swap in a new architecture; returns the topology built from it
    pub async fn update_architecture(
        &self,
        document: ArchitectureDocument,
    ) -> Result<Arc<TopologyGraph>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(TopologyCommand::UpdateArchitecture {
                document,
                respond_to: tx,
            })
            .await
            .context("failed to send UpdateArchitecture command")?;

        rx.await.context("failed to receive topology")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(TopologyCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
