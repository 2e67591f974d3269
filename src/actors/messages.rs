//! Message types for actor communication
//!
//! - **Commands** go to one actor over its mpsc channel
//! - **Events** are broadcast to every subscriber
//!
//! Events are cloneable; a slow subscriber may lag and miss some, which is
//! fine since every event only says "a newer snapshot exists".

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::architecture::ArchitectureDocument;
use crate::live::ProbeKind;
use crate::probes::ProbeResult;
use crate::topology::TopologyGraph;

/// Published by the aggregator after every probe result it merged
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    /// Which slot changed
    pub probe: ProbeKind,

    /// Whether the probe produced fresh data (false: slot is stale)
    pub success: bool,

    pub error_message: Option<String>,

    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to a ProbeActor
#[derive(Debug)]
pub enum ProbeCommand {
    /// Collect immediately, bypassing the interval timer
    PollNow {
        respond_to: oneshot::Sender<ProbeResult<()>>,
    },

    /// Change the collection cadence; restarts the timer
    UpdateInterval { interval: Duration },

    /// Finish any in-flight collection and exit
    Shutdown,
}

/// Commands that can be sent to the TopologyActor
#[derive(Debug)]
pub enum TopologyCommand {
    /// Latest topology, built on demand if nothing has been built yet
    GetTopology {
        respond_to: oneshot::Sender<Arc<TopologyGraph>>,
    },

    /// Replace the declared architecture and rebuild
    UpdateArchitecture {
        document: ArchitectureDocument,
        respond_to: oneshot::Sender<Arc<TopologyGraph>>,
    },

    Shutdown,
}
