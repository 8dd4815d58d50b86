//! Agent node entity and state model.
//!
//! An `AgentNode` represents one ephemeral worker backed by a cluster job.
//! Nodes are single-use by policy: once retirement begins the node never
//! accepts work again, and a "new" node always gets a new identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::channel::ControlChannel;

/// One ephemeral worker node.
///
/// Shared between the retention sweep, executor event hooks, and the
/// teardown coordinator via `Arc`; all mutable state is interior.
pub struct AgentNode {
    id: String,
    namespace: String,
    auth_token: String,
    reusable: bool,

    /// False once retirement begins; never flips back to true.
    accepting_tasks: AtomicBool,

    /// At-most-once latch for the teardown sequence.
    retired: AtomicBool,

    /// `Some` exactly while the node has zero assigned work.
    idle_since: Mutex<Option<Instant>>,

    /// Live handle to the remote agent process; `None` once disconnected.
    control_channel: Mutex<Option<Arc<dyn ControlChannel>>>,
}

impl AgentNode {
    /// Create a node handle for a freshly provisioned worker. A new node has
    /// no work yet, so it starts idle.
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        auth_token: impl Into<String>,
        reusable: bool,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            auth_token: auth_token.into(),
            reusable,
            accepting_tasks: AtomicBool::new(true),
            retired: AtomicBool::new(false),
            idle_since: Mutex::new(Some(Instant::now())),
            control_channel: Mutex::new(None),
        }
    }

    /// Stable identity; also the teardown serialization key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cluster namespace the backing job lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Token used to address the backing job for termination.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Provisioner hint: whether a replacement should be created on the same
    /// template after this node is retired. Not enforced here.
    pub fn reusable(&self) -> bool {
        self.reusable
    }

    pub fn is_accepting_tasks(&self) -> bool {
        self.accepting_tasks.load(Ordering::SeqCst)
    }

    /// Stop accepting tasks. One-way: there is no corresponding setter back
    /// to true.
    pub fn stop_accepting_tasks(&self) {
        self.accepting_tasks.store(false, Ordering::SeqCst);
    }

    /// Claim the right to run the teardown sequence. Returns true exactly
    /// once per node instance.
    pub(crate) fn begin_retirement(&self) -> bool {
        self.retired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Record that work was assigned: the node is no longer idle.
    pub async fn mark_busy(&self) {
        *self.idle_since.lock().await = None;
    }

    /// Record that the node has zero assigned work. Keeps the original idle
    /// start if the node was already idle.
    pub async fn mark_idle(&self) {
        let mut idle_since = self.idle_since.lock().await;
        if idle_since.is_none() {
            *idle_since = Some(Instant::now());
        }
    }

    /// How long the node has been idle, or `None` if it has work.
    pub async fn idle_duration(&self) -> Option<Duration> {
        self.idle_since.lock().await.map(|since| since.elapsed())
    }

    /// Attach the control channel once the remote agent connects.
    pub async fn attach_channel(&self, channel: Arc<dyn ControlChannel>) {
        *self.control_channel.lock().await = Some(channel);
    }

    /// Current channel handle, if any.
    pub async fn channel(&self) -> Option<Arc<dyn ControlChannel>> {
        self.control_channel.lock().await.clone()
    }

    /// Detach and return the channel handle for teardown.
    pub async fn take_channel(&self) -> Option<Arc<dyn ControlChannel>> {
        self.control_channel.lock().await.take()
    }

    /// Snapshot for operator introspection and logs.
    pub async fn status(&self) -> NodeStatus {
        let idle_secs = self.idle_duration().await.map(|d| d.as_secs());
        let channel_open = self
            .channel()
            .await
            .map(|channel| channel.is_open())
            .unwrap_or(false);

        NodeStatus {
            id: self.id.clone(),
            accepting_tasks: self.is_accepting_tasks(),
            retired: self.is_retired(),
            idle_secs,
            channel_open,
        }
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("reusable", &self.reusable)
            .field("accepting_tasks", &self.is_accepting_tasks())
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Point-in-time view of a node's lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub id: String,
    pub accepting_tasks: bool,
    pub retired: bool,
    /// Seconds idle, or `None` while the node has work.
    pub idle_secs: Option<u64>,
    pub channel_open: bool,
}
