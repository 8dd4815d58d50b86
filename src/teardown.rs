//! Teardown coordinator: the single serialization point for node retirement.
//!
//! Both trigger sources (the retention sweep and executor completion events)
//! funnel into [`TeardownCoordinator::retire`]. The sequence for one node:
//!
//! 1. Stop accepting tasks (unconditional, re-applied on duplicate calls).
//! 2. Best-effort reconnect suppression over the control channel.
//! 3. Channel disconnect, waited on for a bounded time.
//! 4. Cluster job stop + deregistration, offloaded to the reclaim workers.
//!
//! Steps 1-3 complete before `retire` returns, so the node has stopped
//! accepting work by the time the caller resumes; step 4 is detached because
//! cluster I/O latency is unbounded. The whole sequence runs at most once
//! per node identity no matter how many callers race.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::channel::DisconnectCause;
use crate::cluster::ClusterApi;
use crate::config::RetentionConfig;
use crate::node::AgentNode;
use crate::notifier::RemoteDisconnectNotifier;
use crate::registry::NodeRegistry;
use crate::worker::ReclaimPool;

pub struct TeardownCoordinator {
    config: RetentionConfig,
    reclaim: ReclaimPool,

    /// Per-node teardown locks, keyed by node id. Unrelated nodes never
    /// contend.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TeardownCoordinator {
    /// Create a coordinator and spawn its reclaim workers.
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        registry: Arc<NodeRegistry>,
        config: RetentionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let reclaim = ReclaimPool::start(cluster, registry, &config, shutdown);
        Self {
            config,
            reclaim,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Retire a node. Safe to call concurrently for the same node; only one
    /// physical teardown executes, and every call leaves the node not
    /// accepting tasks.
    pub async fn retire(&self, node: &Arc<AgentNode>) {
        // Outside the lock so even losing callers re-apply it.
        node.stop_accepting_tasks();

        let lock = self.node_lock(node.id()).await;
        let guard = lock.lock().await;

        if !node.begin_retirement() {
            debug!(node = %node.id(), "Teardown already executed, skipping");
            return;
        }

        info!(node = %node.id(), "Retiring node");

        // Advisory: tell the remote agent to stop reconnecting.
        if let Some(channel) = node.channel().await {
            if let Err(e) = RemoteDisconnectNotifier::notify(channel.as_ref()).await {
                info!(node = %node.id(), error = %e, "Remote disconnect notification failed");
            }
        }

        // Disconnect the channel, but never wait longer than the configured
        // bound: a hung channel is exactly the failure teardown recovers from.
        if let Some(channel) = node.take_channel().await {
            let wait = self.config.disconnect_timeout;
            match tokio::time::timeout(wait, channel.disconnect(DisconnectCause::Retired)).await {
                Ok(Ok(())) => {
                    debug!(node = %node.id(), "Control channel disconnected");
                }
                Ok(Err(e)) => {
                    info!(node = %node.id(), error = %e, "Ignoring control channel disconnect error");
                }
                Err(_) => {
                    info!(
                        node = %node.id(),
                        timeout_secs = wait.as_secs(),
                        "Timed out waiting for control channel disconnect"
                    );
                }
            }
        }

        self.reclaim.submit(Arc::clone(node));

        // The id never retires twice, so its lock entry can go. Late callers
        // holding the old lock hit the retired latch and return.
        drop(guard);
        self.locks.lock().await.remove(node.id());
    }

    /// Reclaim jobs queued but not yet picked up by a worker.
    pub fn reclaim_backlog(&self) -> usize {
        self.reclaim.backlog()
    }

    async fn node_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }
}
