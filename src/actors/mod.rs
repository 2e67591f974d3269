//! Actor-based collection and topology pipeline
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels.
//!
//! ```text
//!   ProbeActor(containers)   ProbeActor(ports)   ProbeActor(cloud)
//!            │                      │                   │
//!            └──────────────┬───────┴───────────────────┘
//!                           │ record
//!                 ┌─────────▼──────────┐
//!                 │ LiveStateAggregator│──► SnapshotEvent (broadcast)
//!                 └─────────┬──────────┘
//!                           │ snapshot
//!                 ┌─────────▼──────────┐
//!                 │   TopologyActor    │──► Arc<TopologyGraph>
//!                 └────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel
//! 2. **Events**: the aggregator broadcasts a [`messages::SnapshotEvent`] per
//!    merged probe result
//! 3. **Request/Response**: oneshot channels for queries such as PollNow

pub mod messages;
pub mod probe;
pub mod topology;

pub use probe::ProbeHandle;
pub use topology::TopologyHandle;
