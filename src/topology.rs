//! One full topology pass: reconcile, lay out, attach live context

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::architecture::{ArchitectureDocument, DeclaredGroup};
use crate::layout::{LayoutConfig, PositionedNode, layout};
use crate::live::{CloudPlacement, LiveSnapshot, SlotFreshness};
use crate::reconcile::{ReconciledEdge, reconcile};

/// Freshness of every probe's data at the time the graph was built
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub containers: SlotFreshness,
    pub ports: SlotFreshness,
    pub cloud: SlotFreshness,
}

impl Freshness {
    pub fn of(snapshot: &LiveSnapshot) -> Self {
        Self {
            containers: snapshot.containers.freshness(),
            ports: snapshot.ports.freshness(),
            cloud: snapshot.cloud.freshness(),
        }
    }
}

/// What a renderer needs to draw the infrastructure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyGraph {
    pub nodes: Vec<PositionedNode>,

    /// Only edges whose endpoints both exist
    pub edges: Vec<ReconciledEdge>,

    pub groups: Vec<DeclaredGroup>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudPlacement>,

    pub freshness: Freshness,
    pub generated_at: DateTime<Utc>,
}

impl TopologyGraph {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.node.id() == id)
    }
}

/// Build the topology for `doc` against `snapshot`
///
/// The document's own layout settings take precedence over `layout_config`.
#[instrument(skip_all, fields(nodes = doc.nodes.len(), edges = doc.edges.len()))]
pub fn build_topology(
    doc: &ArchitectureDocument,
    snapshot: &LiveSnapshot,
    layout_config: &LayoutConfig,
) -> TopologyGraph {
    let reconciled = reconcile(doc, snapshot);
    let layout_config = doc.layout.as_ref().unwrap_or(layout_config);
    let nodes = layout(&reconciled, layout_config);

    debug!(
        "topology built: {} nodes, {} edges",
        nodes.len(),
        reconciled.edges.len()
    );

    TopologyGraph {
        nodes,
        edges: reconciled.edges,
        groups: doc.groups.clone(),
        cloud: snapshot.cloud().cloned(),
        freshness: Freshness::of(snapshot),
        generated_at: Utc::now(),
    }
}
