//! Edge health derived from endpoint statuses

use serde::{Deserialize, Serialize};

use super::NodeStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeHealth {
    Healthy,
    Degraded,
    Broken,
}

impl EdgeHealth {
    /// Stroke color suggested to the renderer
    pub fn color(self) -> &'static str {
        match self {
            EdgeHealth::Healthy => "#22c55e",
            EdgeHealth::Degraded => "#f59e0b",
            EdgeHealth::Broken => "#ef4444",
        }
    }

    pub fn opacity(self) -> f64 {
        match self {
            EdgeHealth::Broken => 0.4,
            EdgeHealth::Healthy | EdgeHealth::Degraded => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeState {
    pub health: EdgeHealth,

    /// Only when traffic can actually flow: both ends running
    pub animated: bool,
}

/// Health of an edge between `source` and `target`
///
/// Missing beats stopped; both running is the only animated case.
pub fn edge_state(source: NodeStatus, target: NodeStatus) -> EdgeState {
    use NodeStatus::*;

    match (source, target) {
        (Running, Running) => EdgeState {
            health: EdgeHealth::Healthy,
            animated: true,
        },
        (Missing, _) | (_, Missing) => EdgeState {
            health: EdgeHealth::Broken,
            animated: false,
        },
        (Stopped, _) | (_, Stopped) => EdgeState {
            health: EdgeHealth::Degraded,
            animated: false,
        },
        _ => EdgeState {
            health: EdgeHealth::Healthy,
            animated: false,
        },
    }
}
