//! API shared state containing actor handles

use std::sync::Arc;

use crate::actors::{ProbeHandle, TopologyHandle};
use crate::aggregator::LiveStateAggregator;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<LiveStateAggregator>,
    pub topology: TopologyHandle,

    /// One handle per running probe actor
    pub probes: Vec<ProbeHandle>,
}

impl ApiState {
    pub fn new(
        aggregator: Arc<LiveStateAggregator>,
        topology: TopologyHandle,
        probes: Vec<ProbeHandle>,
    ) -> Self {
        Self {
            aggregator,
            topology,
            probes,
        }
    }
}
