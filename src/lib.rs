pub mod actors;
pub mod aggregator;
pub mod api;
pub mod architecture;
pub mod config;
pub mod layout;
pub mod live;
pub mod probes;
pub mod reconcile;
pub mod topology;
pub mod util;

pub use aggregator::LiveStateAggregator;
pub use architecture::{ArchitectureDocument, DeclaredEdge, DeclaredGroup, DeclaredNode, NodeKind};
pub use live::{CloudPlacement, LiveContainer, LivePort, LiveSnapshot, ProcessRuntime};
pub use topology::{TopologyGraph, build_topology};
