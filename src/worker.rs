//! Background reclaim workers.
//!
//! The tail of teardown (cluster job stop + deregistration) runs here,
//! decoupled from the triggering thread: cluster API latency is unbounded
//! and must never share a thread with task-scheduling logic. The queue is
//! bounded so a reclaim backlog is observable instead of silently unbounded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use crate::cluster::ClusterApi;
use crate::config::RetentionConfig;
use crate::node::AgentNode;
use crate::registry::NodeRegistry;

struct ReclaimJob {
    node: Arc<AgentNode>,
}

/// Pool of workers draining the reclaim queue.
pub struct ReclaimPool {
    tx: mpsc::Sender<ReclaimJob>,
    backlog: Arc<AtomicUsize>,
}

impl ReclaimPool {
    /// Spawn the worker tasks and return a handle for submitting jobs.
    pub fn start(
        cluster: Arc<dyn ClusterApi>,
        registry: Arc<NodeRegistry>,
        config: &RetentionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let workers = config.reclaim_workers.max(1);
        let queue_depth = config.reclaim_queue_depth.max(1);

        let (tx, rx) = mpsc::channel(queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let backlog = Arc::new(AtomicUsize::new(0));

        info!(workers, queue_depth, "Starting reclaim workers");

        for worker_id in 0..workers {
            tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&cluster),
                Arc::clone(&registry),
                Arc::clone(&backlog),
                shutdown.clone(),
            ));
        }

        Self { tx, backlog }
    }

    /// Queue the cluster stop + deregistration for a node. Never blocks the
    /// caller; a full queue drops the job with a warning so a stuck cluster
    /// API surfaces in logs rather than stalling the scheduler.
    pub fn submit(&self, node: Arc<AgentNode>) {
        // Counted before the send: a worker may pick the job up (and
        // decrement) the moment it lands in the queue.
        self.backlog.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(ReclaimJob { node }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.backlog.fetch_sub(1, Ordering::SeqCst);
                warn!(node = %job.node.id(), "Reclaim queue full, dropping job");
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.backlog.fetch_sub(1, Ordering::SeqCst);
                warn!(node = %job.node.id(), "Reclaim workers stopped, dropping job");
            }
        }
    }

    /// Jobs queued but not yet picked up by a worker.
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<ReclaimJob>>>,
    cluster: Arc<dyn ClusterApi>,
    registry: Arc<NodeRegistry>,
    backlog: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            job = async { rx.lock().await.recv().await } => {
                match job {
                    Some(job) => job,
                    None => break,
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(worker_id, "Reclaim worker shutting down");
                    break;
                }
                continue;
            }
        };

        backlog.fetch_sub(1, Ordering::SeqCst);
        reclaim(&*cluster, &registry, &job.node).await;
    }
}

/// Stop the cluster job and deregister the node, holding the registry's
/// mutation lock so no scheduling decision can touch the node meanwhile.
///
/// Failures are logged and not retried: the prior outcome of a failed
/// cluster mutation is ambiguous, and repeated failures (e.g. revoked
/// credentials) need operator attention, not masking.
async fn reclaim(cluster: &dyn ClusterApi, registry: &NodeRegistry, node: &Arc<AgentNode>) {
    let mut table = registry.lock_nodes().await;

    if !table.contains(node.id()) {
        // Already deregistered by an earlier pass.
        return;
    }

    if let Err(e) = cluster
        .stop_job(node.id(), node.namespace(), node.auth_token())
        .await
    {
        // Node stays registered for operator attention.
        warn!(node = %node.id(), error = %e, "Failed to stop cluster job");
        return;
    }

    table.remove(node.id());
    info!(node = %node.id(), "Node deregistered");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cluster::MockClusterApi;

    fn test_node(id: &str) -> Arc<AgentNode> {
        Arc::new(AgentNode::new(id, "builds", "tok", false))
    }

    async fn wait_until_deregistered(registry: &NodeRegistry, id: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.contains(id).await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("node was never deregistered");
    }

    #[tokio::test]
    async fn test_reclaim_stops_job_and_deregisters() {
        let cluster = Arc::new(MockClusterApi::new());
        let registry = Arc::new(NodeRegistry::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let pool = ReclaimPool::start(
            cluster.clone(),
            Arc::clone(&registry),
            &RetentionConfig::default(),
            shutdown_rx,
        );

        let node = test_node("w1");
        registry.register(Arc::clone(&node)).await;
        pool.submit(node);

        wait_until_deregistered(&registry, "w1").await;
        assert_eq!(cluster.stop_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_stop_leaves_node_registered() {
        let cluster = Arc::new(MockClusterApi::failing());
        let registry = Arc::new(NodeRegistry::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let pool = ReclaimPool::start(
            cluster.clone(),
            Arc::clone(&registry),
            &RetentionConfig::default(),
            shutdown_rx,
        );

        let node = test_node("w1");
        registry.register(Arc::clone(&node)).await;
        pool.submit(node);

        // Give the worker a chance to run the job.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.contains("w1").await);
        assert_eq!(pool.backlog(), 0);
    }

    #[tokio::test]
    async fn test_backlog_counts_queued_jobs_only() {
        let cluster = Arc::new(MockClusterApi::new());
        let registry = Arc::new(NodeRegistry::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let config = RetentionConfig {
            reclaim_workers: 1,
            reclaim_queue_depth: 1,
            ..RetentionConfig::default()
        };
        let pool = ReclaimPool::start(
            cluster.clone(),
            Arc::clone(&registry),
            &config,
            shutdown_rx,
        );

        let w1 = test_node("w1");
        let w2 = test_node("w2");
        registry.register(Arc::clone(&w1)).await;
        registry.register(Arc::clone(&w2)).await;

        // Park the single worker on the mutation lock so queue occupancy is
        // under test control.
        let guard = registry.lock_nodes().await;

        pool.submit(w1);
        tokio::time::timeout(Duration::from_secs(5), async {
            while pool.backlog() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("worker never picked up the first job");

        // Worker is blocked holding w1; w2 occupies the only queue slot.
        pool.submit(w2);
        assert_eq!(pool.backlog(), 1);

        // w3 is dropped on the full queue; the counter must not move.
        pool.submit(test_node("w3"));
        assert_eq!(pool.backlog(), 1);

        drop(guard);
        wait_until_deregistered(&registry, "w1").await;
        wait_until_deregistered(&registry, "w2").await;
        assert_eq!(pool.backlog(), 0);
        assert_eq!(cluster.stop_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_node_is_skipped() {
        let cluster = Arc::new(MockClusterApi::new());
        let registry = Arc::new(NodeRegistry::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let pool = ReclaimPool::start(
            cluster.clone(),
            Arc::clone(&registry),
            &RetentionConfig::default(),
            shutdown_rx,
        );

        pool.submit(test_node("ghost"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cluster.stop_calls().is_empty());
    }
}
