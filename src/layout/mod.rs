//! Two-pass layout of a reconciled graph
//!
//! Services and datastores are laid out separately with the same layered
//! algorithm. Services go first; the datastore layer is then shifted below
//! the lowest service so storage always sits underneath the compute that
//! uses it. Edges between a service and a datastore do not influence either
//! pass.

pub mod layered;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::reconcile::{ReconciledGraph, ReconciledNode};

pub use layered::{LayeredParams, Point, layered};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutDirection {
    /// Ranks go down
    #[default]
    #[serde(rename = "TB")]
    TopToBottom,

    /// Ranks go right
    #[serde(rename = "LR")]
    LeftToRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    #[serde(rename = "layoutDirection")]
    pub direction: LayoutDirection,
    pub node_spacing: f64,
    pub rank_spacing: f64,
    pub node_width: f64,
    pub node_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::TopToBottom,
            node_spacing: 50.0,
            rank_spacing: 80.0,
            node_width: 180.0,
            node_height: 60.0,
        }
    }
}

impl LayoutConfig {
    /// Reject footprints and spacings the layout cannot honor
    pub fn validate(&self) -> Result<(), String> {
        if self.node_width <= 0.0 {
            return Err(format!("nodeWidth must be positive, got {}", self.node_width));
        }
        if self.node_height <= 0.0 {
            return Err(format!("nodeHeight must be positive, got {}", self.node_height));
        }
        if self.node_spacing < 0.0 {
            return Err(format!("nodeSpacing must not be negative, got {}", self.node_spacing));
        }
        if self.rank_spacing < 0.0 {
            return Err(format!("rankSpacing must not be negative, got {}", self.rank_spacing));
        }
        Ok(())
    }

    fn params(&self) -> LayeredParams {
        LayeredParams {
            direction: self.direction,
            node_width: self.node_width,
            node_height: self.node_height,
            node_spacing: self.node_spacing,
            rank_spacing: self.rank_spacing,
        }
    }
}

/// A reconciled node with the top-left corner of its footprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    #[serde(flatten)]
    pub node: ReconciledNode,
    pub x: f64,
    pub y: f64,
}

/// Position every node of `graph`, keeping the node order
pub fn layout(graph: &ReconciledGraph, config: &LayoutConfig) -> Vec<PositionedNode> {
    let params = config.params();

    let services = pass(graph, &params, ReconciledNode::is_service);
    let datastores = pass(graph, &params, ReconciledNode::is_datastore);

    // lowest service center, measured on the y axis in both directions
    let max_service_y = services
        .iter()
        .filter_map(|center| center.map(|point| point.y))
        .reduce(f64::max);
    let datastore_offset = max_service_y
        .map(|max_y| max_y + config.rank_spacing + config.node_height)
        .unwrap_or(0.0);

    trace!(
        "layout: max service y {:?}, datastore offset {datastore_offset}",
        max_service_y
    );

    graph
        .nodes
        .iter()
        .zip(services.into_iter().zip(datastores))
        .map(|(node, centers)| {
            let center = match centers {
                (Some(center), _) => center,
                (None, Some(center)) => Point {
                    x: center.x,
                    y: center.y + datastore_offset,
                },
                (None, None) => Point::default(),
            };

            PositionedNode {
                node: node.clone(),
                x: center.x - config.node_width / 2.0,
                y: center.y - config.node_height / 2.0,
            }
        })
        .collect()
}

/// Lay out the nodes selected by `include` and the edges among them;
/// returns one entry per graph node, `None` for nodes outside the pass
fn pass(
    graph: &ReconciledGraph,
    params: &LayeredParams,
    include: fn(&ReconciledNode) -> bool,
) -> Vec<Option<Point>> {
    let members: Vec<usize> = graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| include(node))
        .map(|(i, _)| i)
        .collect();

    let ids: Vec<&str> = members.iter().map(|&i| graph.nodes[i].id()).collect();

    let edges: Vec<(&str, &str)> = graph
        .edges
        .iter()
        .map(|edge| (edge.declared.source.as_str(), edge.declared.target.as_str()))
        .filter(|(source, target)| ids.contains(source) && ids.contains(target))
        .collect();

    let mut positions = vec![None; graph.nodes.len()];
    for (member, point) in members.into_iter().zip(layered(&ids, &edges, params)) {
        positions[member] = Some(point);
    }
    positions
}
