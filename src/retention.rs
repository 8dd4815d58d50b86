//! Idle-node retention policy and its ticking worker.
//!
//! The policy is a dumb probe: every tick it measures how long a node has
//! been idle and hands anything over the threshold to the teardown
//! coordinator. It always reports the same fixed re-check delay; there is no
//! adaptive backoff, because teardown is idempotent and safe to re-trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::RetentionConfig;
use crate::node::AgentNode;
use crate::registry::NodeRegistry;
use crate::teardown::TeardownCoordinator;

pub struct RetentionPolicy {
    coordinator: Arc<TeardownCoordinator>,
    config: RetentionConfig,
}

impl RetentionPolicy {
    pub fn new(coordinator: Arc<TeardownCoordinator>, config: RetentionConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Evaluate one node; returns the delay until the next check.
    ///
    /// Nodes that are busy, or already past the accepting-tasks point of no
    /// return, are left alone. An idle node past the threshold is retired;
    /// the outcome is observed asynchronously and does not change the
    /// returned delay.
    pub async fn evaluate(&self, node: &Arc<AgentNode>) -> Duration {
        let interval = self.config.sweep_interval();

        if !node.is_accepting_tasks() {
            return interval;
        }

        let Some(idle) = node.idle_duration().await else {
            return interval;
        };

        let threshold = self.config.idle_threshold();
        if idle > threshold {
            info!(
                node = %node.id(),
                idle_secs = idle.as_secs(),
                threshold_secs = threshold.as_secs(),
                "Idle threshold exceeded, retiring node"
            );
            self.coordinator.retire(node).await;
        }

        interval
    }
}

/// Periodic sweep driving [`RetentionPolicy`] over every registered node.
pub struct RetentionWorker {
    policy: RetentionPolicy,
    registry: Arc<NodeRegistry>,
    interval: Duration,
}

impl RetentionWorker {
    pub fn new(policy: RetentionPolicy, registry: Arc<NodeRegistry>) -> Self {
        let interval = policy.config.sweep_interval();
        Self {
            policy,
            registry,
            interval,
        }
    }

    /// Run the sweep until shutdown is signaled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting retention worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Retention worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn sweep(&self) {
        let nodes = self.registry.nodes().await;
        debug!(nodes = nodes.len(), "Retention sweep");
        for node in nodes {
            self.policy.evaluate(&node).await;
        }
    }
}
