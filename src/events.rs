//! Executor event hooks from the external scheduler.
//!
//! The scheduler invokes these callbacks on its own worker threads as tasks
//! move through a node. The dependency direction is outward-only: the core
//! implements the interface, the scheduler calls it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::node::AgentNode;
use crate::teardown::TeardownCoordinator;

/// Identity of a scheduled task, for logging.
#[derive(Debug, Clone)]
pub struct TaskRef {
    pub id: String,
    pub display_name: String,
}

impl TaskRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Hooks invoked by the scheduler's executor subsystem.
#[async_trait]
pub trait ExecutorEventListener: Send + Sync {
    /// A task was assigned to the node.
    async fn on_task_accepted(&self, node: &Arc<AgentNode>, task: &TaskRef);

    /// A task finished successfully.
    async fn on_task_completed(&self, node: &Arc<AgentNode>, task: &TaskRef, duration: Duration);

    /// A task finished with an error.
    async fn on_task_completed_with_error(
        &self,
        node: &Arc<AgentNode>,
        task: &TaskRef,
        duration: Duration,
        cause: &anyhow::Error,
    );
}

/// Listener that retires a node the moment any task on it finishes.
///
/// These workers are single-task-use: retiring immediately instead of
/// keeping the node idle-and-reused eliminates stale or poisoned
/// environments between builds.
pub struct RetirementListener {
    coordinator: Arc<TeardownCoordinator>,
}

impl RetirementListener {
    pub fn new(coordinator: Arc<TeardownCoordinator>) -> Self {
        Self { coordinator }
    }

    async fn done(&self, node: &Arc<AgentNode>, task: &TaskRef) {
        debug!(
            node = %node.id(),
            task = %task.display_name,
            "Task finished, retiring single-use node"
        );
        self.coordinator.retire(node).await;
    }
}

#[async_trait]
impl ExecutorEventListener for RetirementListener {
    async fn on_task_accepted(&self, _node: &Arc<AgentNode>, _task: &TaskRef) {
        // The scheduler updates idle bookkeeping when it assigns work;
        // nothing more to track here.
    }

    async fn on_task_completed(&self, node: &Arc<AgentNode>, task: &TaskRef, duration: Duration) {
        debug!(
            node = %node.id(),
            task = %task.id,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Task completed"
        );
        self.done(node, task).await;
    }

    async fn on_task_completed_with_error(
        &self,
        node: &Arc<AgentNode>,
        task: &TaskRef,
        duration: Duration,
        cause: &anyhow::Error,
    ) {
        warn!(
            node = %node.id(),
            task = %task.id,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            error = %cause,
            "Task completed with error"
        );
        self.done(node, task).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use super::*;
    use crate::cluster::MockClusterApi;
    use crate::config::RetentionConfig;
    use crate::registry::NodeRegistry;

    fn listener() -> (RetirementListener, Arc<NodeRegistry>, watch::Sender<bool>) {
        let registry = Arc::new(NodeRegistry::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let coordinator = Arc::new(TeardownCoordinator::new(
            Arc::new(MockClusterApi::new()),
            Arc::clone(&registry),
            RetentionConfig::default(),
            shutdown_rx,
        ));
        (
            RetirementListener::new(coordinator),
            registry,
            shutdown_tx,
        )
    }

    #[tokio::test]
    async fn test_accepted_does_not_retire() {
        let (listener, _registry, _shutdown) = listener();
        let node = Arc::new(AgentNode::new("w1", "builds", "tok", false));
        let task = TaskRef::new("t1", "build #1");

        listener.on_task_accepted(&node, &task).await;

        assert!(node.is_accepting_tasks());
        assert!(!node.is_retired());
    }

    #[tokio::test]
    async fn test_completion_retires() {
        let (listener, _registry, _shutdown) = listener();
        let node = Arc::new(AgentNode::new("w1", "builds", "tok", false));
        let task = TaskRef::new("t1", "build #1");

        listener
            .on_task_completed(&node, &task, Duration::from_secs(30))
            .await;

        assert!(!node.is_accepting_tasks());
        assert!(node.is_retired());
    }

    #[tokio::test]
    async fn test_extreme_duration_is_handled() {
        let (listener, _registry, _shutdown) = listener();
        let node = Arc::new(AgentNode::new("w1", "builds", "tok", false));
        let task = TaskRef::new("t1", "build #1");

        // A duration whose millisecond count exceeds u64 must not panic or
        // wrap in the log fields.
        listener.on_task_completed(&node, &task, Duration::MAX).await;

        assert!(node.is_retired());
    }

    #[tokio::test]
    async fn test_failed_completion_retires() {
        let (listener, _registry, _shutdown) = listener();
        let node = Arc::new(AgentNode::new("w1", "builds", "tok", false));
        let task = TaskRef::new("t1", "build #1");
        let cause = anyhow::anyhow!("compile failed");

        listener
            .on_task_completed_with_error(&node, &task, Duration::from_secs(30), &cause)
            .await;

        assert!(!node.is_accepting_tasks());
        assert!(node.is_retired());
    }
}
