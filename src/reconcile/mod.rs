//! Reconciliation of the declared architecture against live state
//!
//! Every node gets a status; every edge gets a health derived from the
//! statuses of its endpoints. The pass is pure: the same document and
//! snapshot always give the same graph.
//!
//! ## Services
//!
//! 1. Match a container by `serviceRef` (see [`matcher`]). A matched container
//!    decides the status on its own: `running` when its runtime status reads
//!    up/running, `stopped` otherwise.
//! 2. No container: any declared host port listening makes the service
//!    `running`, owned by whatever process the port scan reported.
//! 3. Otherwise `missing`.
//!
//! ## Datastores
//!
//! A datastore has no process of its own to look at. It is `running` when at
//! least one service with an edge into it is running, `expected` otherwise.

pub mod health;
pub mod matcher;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::architecture::{ArchitectureDocument, DeclaredEdge, DeclaredNode, NodeKind};
use crate::live::{LiveSnapshot, ProcessRuntime};

pub use health::{EdgeHealth, EdgeState, edge_state};
pub use matcher::{MatchOutcome, MatchRule, match_container};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Running,
    Stopped,
    Missing,

    /// Datastore without a running service attached
    Expected,
}

/// A declared node with its observed state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledNode {
    #[serde(flatten)]
    pub declared: DeclaredNode,

    pub status: NodeStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<ProcessRuntime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_compose_project: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_compose_service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_container: Option<String>,
}

impl ReconciledNode {
    fn bare(declared: &DeclaredNode, status: NodeStatus) -> Self {
        Self {
            declared: declared.clone(),
            status,
            cpu_percent: None,
            memory_mb: None,
            runtime: None,
            resolved_compose_project: None,
            resolved_compose_service: None,
            matched_container: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.declared.id
    }

    pub fn is_service(&self) -> bool {
        self.declared.is_service()
    }

    pub fn is_datastore(&self) -> bool {
        self.declared.is_datastore()
    }
}

/// A declared edge with its health
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledEdge {
    #[serde(flatten)]
    pub declared: DeclaredEdge,

    pub health_color: EdgeHealth,
    pub animated: bool,
    pub label: String,

    /// Hex stroke color for `health_color`
    pub color: String,
    pub opacity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciledGraph {
    pub nodes: Vec<ReconciledNode>,
    pub edges: Vec<ReconciledEdge>,
}

impl ReconciledGraph {
    pub fn node(&self, id: &str) -> Option<&ReconciledNode> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn edge(&self, id: &str) -> Option<&ReconciledEdge> {
        self.edges.iter().find(|edge| edge.declared.id == id)
    }
}

/// Reconcile every declared node and edge against `snapshot`
pub fn reconcile(doc: &ArchitectureDocument, snapshot: &LiveSnapshot) -> ReconciledGraph {
    // services first, datastores depend on them
    let mut services: HashMap<&str, ReconciledNode> = HashMap::new();
    for node in doc.nodes.iter().filter(|node| node.is_service()) {
        services
            .entry(node.id.as_str())
            .or_insert_with(|| reconcile_service(node, snapshot));
    }

    let mut statuses: HashMap<&str, NodeStatus> = HashMap::new();
    let mut nodes = Vec::with_capacity(doc.nodes.len());

    for node in &doc.nodes {
        let reconciled = match node.kind {
            NodeKind::Service => match services.get(node.id.as_str()) {
                Some(reconciled) => reconciled.clone(),
                None => reconcile_service(node, snapshot),
            },
            NodeKind::Datastore => reconcile_datastore(node, doc, &services),
        };
        statuses.entry(node.id.as_str()).or_insert(reconciled.status);
        nodes.push(reconciled);
    }

    let mut edges = Vec::with_capacity(doc.edges.len());
    for edge in &doc.edges {
        let (Some(&source), Some(&target)) = (
            statuses.get(edge.source.as_str()),
            statuses.get(edge.target.as_str()),
        ) else {
            debug!(
                "dropping edge '{}': {} -> {} references an unknown node",
                edge.id, edge.source, edge.target
            );
            continue;
        };

        let state = edge_state(source, target);
        edges.push(ReconciledEdge {
            declared: edge.clone(),
            health_color: state.health,
            animated: state.animated,
            label: edge.label(),
            color: state.health.color().to_string(),
            opacity: state.health.opacity(),
        });
    }

    trace!(
        "reconciled {} nodes, {} of {} edges",
        nodes.len(),
        edges.len(),
        doc.edges.len()
    );

    ReconciledGraph { nodes, edges }
}

fn reconcile_service(node: &DeclaredNode, snapshot: &LiveSnapshot) -> ReconciledNode {
    let matched = node
        .service_ref
        .as_deref()
        .and_then(|service_ref| match_container(service_ref, snapshot.containers()));

    if let Some(MatchOutcome { container, rule, .. }) = matched {
        trace!("{}: matched container {} ({rule})", node.id, container.name);

        let status = if container.is_running() {
            NodeStatus::Running
        } else {
            NodeStatus::Stopped
        };

        return ReconciledNode {
            cpu_percent: container.cpu_percent,
            memory_mb: container.memory_mb,
            runtime: Some(ProcessRuntime::ContainerRuntime),
            resolved_compose_project: container.compose_project.clone(),
            resolved_compose_service: container.compose_service.clone(),
            matched_container: Some(container.name.clone()),
            ..ReconciledNode::bare(node, status)
        };
    }

    let listening = node
        .host_ports()
        .into_iter()
        .filter_map(|port| snapshot.port(port))
        .find(|live| live.listening);

    match listening {
        Some(live) => {
            let runtime = live
                .owning_process
                .as_ref()
                .map(|process| process.runtime)
                .unwrap_or(ProcessRuntime::OsProcess);
            trace!("{}: port {} listening ({runtime})", node.id, live.port);

            ReconciledNode {
                runtime: Some(runtime),
                ..ReconciledNode::bare(node, NodeStatus::Running)
            }
        }
        None => ReconciledNode::bare(node, NodeStatus::Missing),
    }
}

fn reconcile_datastore(
    node: &DeclaredNode,
    doc: &ArchitectureDocument,
    services: &HashMap<&str, ReconciledNode>,
) -> ReconciledNode {
    let served = doc
        .edges
        .iter()
        .filter(|edge| edge.target == node.id)
        .filter_map(|edge| services.get(edge.source.as_str()))
        .any(|service| service.status == NodeStatus::Running);

    let status = if served {
        NodeStatus::Running
    } else {
        NodeStatus::Expected
    };

    ReconciledNode::bare(node, status)
}
