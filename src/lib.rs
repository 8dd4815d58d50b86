//! Ephemeral worker-node lifecycle controller.
//!
//! This crate decides when a cloud-provisioned worker node has been idle
//! long enough to reclaim and drives the failure-tolerant teardown sequence
//! that retires it: no orphaned remote processes, no stale scheduler
//! entries, no dangling cluster resources. It coordinates three
//! independently-failing actors (the scheduler's idle state, a remote
//! long-lived agent process, and the external cluster API) while
//! guaranteeing each node is torn down at most once.
//!
//! ## Architecture
//!
//! Two trigger sources funnel into one serialization point:
//!
//! ```text
//! RetentionWorker (ticking)      ExecutorEventListener (event-driven)
//!         \                              /
//!          v                            v
//!            TeardownCoordinator::retire
//!          stop accepting -> notify remote -> disconnect (bounded)
//!                              |
//!                              v (detached)
//!            ReclaimPool: cluster stop + deregistration
//! ```
//!
//! ## Modules
//!
//! - `node`: the `AgentNode` entity and its state model
//! - `registry`: node table behind the global node-mutation lock
//! - `retention`: idle-threshold policy and the periodic sweep
//! - `events`: executor hooks that retire single-use nodes on completion
//! - `teardown`: the at-most-once retirement sequence
//! - `worker`: background reclaim queue and workers
//! - `cluster`, `channel`: boundaries to the cluster API and the remote
//!   agent's control channel, with mock implementations for testing

pub mod channel;
pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod node;
pub mod notifier;
pub mod registry;
pub mod retention;
pub mod teardown;
pub mod worker;

// Re-export commonly used types
pub use channel::{ControlChannel, ControlCommand, DisconnectCause, MockControlChannel};
pub use cluster::{ClusterApi, MockClusterApi, StopCall};
pub use config::RetentionConfig;
pub use error::ChannelError;
pub use events::{ExecutorEventListener, RetirementListener, TaskRef};
pub use node::{AgentNode, NodeStatus};
pub use registry::NodeRegistry;
pub use retention::{RetentionPolicy, RetentionWorker};
pub use teardown::TeardownCoordinator;
