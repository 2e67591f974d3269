//! Declared architecture model
//!
//! The declared architecture is the user-authored description of what should
//! be running: nodes (services and datastores), the edges between them and
//! organizational groups. It is loaded once and never mutated by the engine;
//! replacing it means swapping the whole document.
//!
//! ## Example
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "api", "kind": "service", "label": "API", "serviceRef": "api", "ports": ["8080:80"] },
//!     { "id": "db", "kind": "datastore", "label": "Postgres", "volumeRef": "pgdata", "ports": ["5432"] }
//!   ],
//!   "edges": [
//!     { "id": "api-db", "source": "api", "target": "db", "kind": "network", "protocol": "tcp", "port": 5432 }
//!   ],
//!   "groups": []
//! }
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::layout::LayoutConfig;

/// Kind of a declared node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Service,
    Datastore,
}

/// A node the operator expects to exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredNode {
    pub id: String,

    #[serde(alias = "type")]
    pub kind: NodeKind,

    #[serde(default)]
    pub label: String,

    /// Container name this service is expected to run as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ref: Option<String>,

    /// Volume backing this datastore
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_ref: Option<String>,

    /// `host:container` port pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Presentation hint, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl DeclaredNode {
    /// Host side of every parsable port mapping, in declaration order
    pub fn host_ports(&self) -> Vec<u16> {
        self.ports
            .iter()
            .filter_map(|mapping| PortMapping::parse(mapping).ok())
            .map(|mapping| mapping.host)
            .collect()
    }

    pub fn is_service(&self) -> bool {
        self.kind == NodeKind::Service
    }

    pub fn is_datastore(&self) -> bool {
        self.kind == NodeKind::Datastore
    }
}

/// A parsed `host:container` port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    /// Parse the compose-style mapping forms `5432`, `8080:80`,
    /// `127.0.0.1:8080:80` and any of those with a `/tcp` or `/udp` suffix.
    pub fn parse(raw: &str) -> Result<PortMapping, ArchitectureError> {
        let invalid = || ArchitectureError::InvalidPort(raw.to_string());

        let without_proto = raw.trim().split('/').next().unwrap_or_default();
        let parts: Vec<&str> = without_proto.split(':').collect();

        let (host, container) = match parts.as_slice() {
            [single] => (*single, *single),
            [host, container] => (*host, *container),
            [_ip, host, container] => (*host, *container),
            _ => return Err(invalid()),
        };

        let host = host.trim().parse::<u16>().map_err(|_| invalid())?;
        let container = container.trim().parse::<u16>().map_err(|_| invalid())?;

        Ok(PortMapping { host, container })
    }
}

/// Volume access mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    Ro,
    #[default]
    Rw,
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeMode::Ro => write!(f, "ro"),
            VolumeMode::Rw => write!(f, "rw"),
        }
    }
}

/// Kind-specific edge metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EdgeSpec {
    Network {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },
    Volume {
        #[serde(default)]
        mode: VolumeMode,
    },
}

/// A connection the operator expects between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredEdge {
    pub id: String,
    pub source: String,
    pub target: String,

    #[serde(flatten)]
    pub spec: EdgeSpec,
}

impl DeclaredEdge {
    /// Label shown on the edge: `protocol[:port]` for network edges, the
    /// access mode for volume edges
    pub fn label(&self) -> String {
        match &self.spec {
            EdgeSpec::Network { protocol, port } => {
                let protocol = protocol.as_deref().unwrap_or("tcp");
                match port {
                    Some(port) => format!("{protocol}:{port}"),
                    None => protocol.to_string(),
                }
            }
            EdgeSpec::Volume { mode } => mode.to_string(),
        }
    }
}

/// Organizational grouping (e.g. a compose project)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredGroup {
    pub id: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// The whole declared architecture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDocument {
    #[serde(default)]
    pub nodes: Vec<DeclaredNode>,

    #[serde(default)]
    pub edges: Vec<DeclaredEdge>,

    #[serde(default)]
    pub groups: Vec<DeclaredGroup>,

    /// Overrides the hub's layout configuration when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutConfig>,
}

impl ArchitectureDocument {
    pub fn node(&self, id: &str) -> Option<&DeclaredNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// All declared host ports, deduplicated and sorted
    pub fn harvest_ports(&self) -> Vec<u16> {
        self.nodes
            .iter()
            .flat_map(DeclaredNode::host_ports)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Edges whose endpoints both reference declared nodes
    pub fn valid_edges(&self) -> impl Iterator<Item = &DeclaredEdge> {
        let ids: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        self.edges.iter().filter(move |edge| {
            ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str())
        })
    }

    /// Check the document for problems the engine tolerates but the author
    /// probably did not intend
    pub fn validate(&self) -> Vec<ArchitectureIssue> {
        let mut issues = vec![];

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                issues.push(ArchitectureIssue::DuplicateNodeId(node.id.clone()));
            }
        }

        let group_ids: HashSet<&str> = self.groups.iter().map(|group| group.id.as_str()).collect();

        for node in &self.nodes {
            match node.kind {
                NodeKind::Service => {
                    let has_ref = node
                        .service_ref
                        .as_deref()
                        .is_some_and(|service_ref| !service_ref.trim().is_empty());
                    if !has_ref && node.ports.is_empty() {
                        issues.push(ArchitectureIssue::ServiceWithoutDetection(node.id.clone()));
                    }
                }
                NodeKind::Datastore => {
                    if node.volume_ref.is_none() {
                        issues.push(ArchitectureIssue::DatastoreWithoutVolume(node.id.clone()));
                    }
                }
            }

            if let Some(group) = &node.group {
                if !group_ids.contains(group.as_str()) {
                    issues.push(ArchitectureIssue::UnknownGroup {
                        node: node.id.clone(),
                        group: group.clone(),
                    });
                }
            }

            for mapping in &node.ports {
                if PortMapping::parse(mapping).is_err() {
                    issues.push(ArchitectureIssue::InvalidPortMapping {
                        node: node.id.clone(),
                        mapping: mapping.clone(),
                    });
                }
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    issues.push(ArchitectureIssue::DanglingEdge {
                        edge: edge.id.clone(),
                        endpoint: endpoint.clone(),
                    });
                }
            }
        }

        issues
    }
}

/// Non-fatal problems found in a declared architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchitectureIssue {
    DuplicateNodeId(String),
    DanglingEdge { edge: String, endpoint: String },
    ServiceWithoutDetection(String),
    DatastoreWithoutVolume(String),
    UnknownGroup { node: String, group: String },
    InvalidPortMapping { node: String, mapping: String },
}

impl fmt::Display for ArchitectureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchitectureIssue::DuplicateNodeId(id) => write!(f, "duplicate node id '{id}'"),
            ArchitectureIssue::DanglingEdge { edge, endpoint } => {
                write!(f, "edge '{edge}' references unknown node '{endpoint}'")
            }
            ArchitectureIssue::ServiceWithoutDetection(id) => {
                write!(f, "service '{id}' has neither a serviceRef nor ports")
            }
            ArchitectureIssue::DatastoreWithoutVolume(id) => {
                write!(f, "datastore '{id}' has no volumeRef")
            }
            ArchitectureIssue::UnknownGroup { node, group } => {
                write!(f, "node '{node}' references unknown group '{group}'")
            }
            ArchitectureIssue::InvalidPortMapping { node, mapping } => {
                write!(f, "node '{node}' has invalid port mapping '{mapping}'")
            }
        }
    }
}

/// Errors that can occur while loading a declared architecture
#[derive(Debug)]
pub enum ArchitectureError {
    /// The document could not be read
    Io(std::io::Error),

    /// The document is not a valid architecture
    Parse(String),

    /// A port mapping could not be parsed
    InvalidPort(String),

    /// The document's layout settings cannot be honored
    InvalidLayout(String),
}

impl fmt::Display for ArchitectureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchitectureError::Io(err) => write!(f, "failed to read architecture: {err}"),
            ArchitectureError::Parse(msg) => write!(f, "invalid architecture document: {msg}"),
            ArchitectureError::InvalidPort(raw) => write!(f, "invalid port mapping '{raw}'"),
            ArchitectureError::InvalidLayout(msg) => write!(f, "invalid layout: {msg}"),
        }
    }
}

impl std::error::Error for ArchitectureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchitectureError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ArchitectureError {
    fn from(err: std::io::Error) -> Self {
        ArchitectureError::Io(err)
    }
}

impl From<serde_json::Error> for ArchitectureError {
    fn from(err: serde_json::Error) -> Self {
        ArchitectureError::Parse(err.to_string())
    }
}

pub fn parse_architecture(content: &str) -> Result<ArchitectureDocument, ArchitectureError> {
    let document: ArchitectureDocument = serde_json::from_str(content)?;
    if let Some(layout) = &document.layout {
        layout.validate().map_err(ArchitectureError::InvalidLayout)?;
    }
    trace!(
        "parsed architecture with {} nodes, {} edges, {} groups",
        document.nodes.len(),
        document.edges.len(),
        document.groups.len()
    );
    Ok(document)
}

pub fn read_architecture_file(path: &str) -> Result<ArchitectureDocument, ArchitectureError> {
    let content = std::fs::read_to_string(path)?;
    parse_architecture(&content)
}
