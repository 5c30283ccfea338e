#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ClusterError`)
//! - [`docker`]: Docker API abstraction (`DockerClient` trait, `BollardDockerClient`)
//! - [`compose`]: compose CLI abstraction (`ComposeClient` trait, `ComposeCli`)
//! - [`topology`]: Declared nodes and their probes (`ClusterTopology`, `NodeSpec`, `ProbeSpec`)
//! - [`readiness`]: Bounded readiness polling (`ReadinessProber`, `ReadinessState`, `NodeProber`)
//! - [`diagnostics`]: Logs and container states captured on readiness timeout
//! - [`lifecycle`]: Start/stop of the cluster (`ClusterControl` trait, `ClusterManager`)
//!
//! # Architecture
//!
//! ```text
//! ClusterManager.start()
//!     |
//!     +-- ComposeClient.down()   (clean slate, errors tolerated)
//!     +-- ComposeClient.up()
//!     +-- ReadinessProber.await_ready()
//!     |       |
//!     |       +-- NodeProber.probe(node)  x every node, every round
//!     |
//!     +-- on timeout: ComposeClient.logs() + DockerClient.list_project_containers()
//! ```

pub mod compose;
pub mod diagnostics;
pub mod docker;
pub mod error;
pub mod lifecycle;
pub mod readiness;
pub mod topology;

// --- Public API Re-exports ---

// Lifecycle
pub use lifecycle::{ClusterControl, ClusterManager, ClusterSettings};

// Error
pub use error::ClusterError;

// Docker API
pub use docker::{BollardDockerClient, DockerClient};

// Compose CLI
pub use compose::{ComposeCli, ComposeClient};

// Topology
pub use testrun_core::types::NodeRole;
pub use topology::{ClusterTopology, NodeSpec, ProbeSpec};

// Readiness
pub use readiness::{
    ComposeNodeProber, NodeProber, ReadinessMachine, ReadinessOutcome, ReadinessProber,
    ReadinessState,
};

// Diagnostics
pub use diagnostics::{ClusterDiagnostics, ContainerState};
