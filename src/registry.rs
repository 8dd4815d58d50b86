//! Scheduler-side node registry and its global mutation lock.
//!
//! The registry is the single serialization point between teardown and any
//! concurrent scheduling decision: the node table is only ever mutated while
//! holding its mutation lock, so a node cannot be handed new work while the
//! reclaim worker is deregistering it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::node::{AgentNode, NodeStatus};

/// The node table: id -> node. Only reachable through the registry's
/// mutation lock.
#[derive(Default)]
pub struct NodeTable {
    nodes: HashMap<String, Arc<AgentNode>>,
}

impl NodeTable {
    pub fn insert(&mut self, node: Arc<AgentNode>) -> Option<Arc<AgentNode>> {
        self.nodes.insert(node.id().to_string(), node)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<AgentNode>> {
        self.nodes.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<AgentNode>> {
        self.nodes.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot of all node handles.
    pub fn nodes(&self) -> Vec<Arc<AgentNode>> {
        self.nodes.values().cloned().collect()
    }
}

/// Registry of live nodes with a global node-mutation lock.
#[derive(Default)]
pub struct NodeRegistry {
    table: Mutex<NodeTable>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a closure under the node-mutation lock.
    pub async fn with_mutation_lock<R>(&self, f: impl FnOnce(&mut NodeTable) -> R) -> R {
        let mut table = self.table.lock().await;
        f(&mut table)
    }

    /// Acquire the node-mutation lock directly. For critical sections that
    /// need to await (e.g. a cluster call) while holding the lock.
    pub async fn lock_nodes(&self) -> MutexGuard<'_, NodeTable> {
        self.table.lock().await
    }

    /// Add a node to the table.
    pub async fn register(&self, node: Arc<AgentNode>) {
        info!(node = %node.id(), "Registering node");
        self.with_mutation_lock(|table| table.insert(node)).await;
    }

    pub async fn get(&self, id: &str) -> Option<Arc<AgentNode>> {
        self.with_mutation_lock(|table| table.get(id)).await
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.with_mutation_lock(|table| table.contains(id)).await
    }

    pub async fn len(&self) -> usize {
        self.with_mutation_lock(|table| table.len()).await
    }

    /// Snapshot of all registered node handles, for the retention sweep.
    pub async fn nodes(&self) -> Vec<Arc<AgentNode>> {
        self.with_mutation_lock(|table| table.nodes()).await
    }

    /// Status snapshot of every registered node.
    pub async fn status_report(&self) -> Vec<NodeStatus> {
        let nodes = self.nodes().await;
        let mut report = Vec::with_capacity(nodes.len());
        for node in nodes {
            report.push(node.status().await);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(id: &str) -> Arc<AgentNode> {
        Arc::new(AgentNode::new(id, "builds", "tok", false))
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = NodeRegistry::new();
        registry.register(test_node("w1")).await;
        registry.register(test_node("w2")).await;

        assert_eq!(registry.len().await, 2);
        assert!(registry.contains("w1").await);

        let removed = registry
            .with_mutation_lock(|table| table.remove("w1"))
            .await;
        assert_eq!(removed.unwrap().id(), "w1");
        assert!(!registry.contains("w1").await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_reregistering_same_id_replaces() {
        let registry = NodeRegistry::new();
        registry.register(test_node("w1")).await;
        registry.register(test_node("w1")).await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_status_report_covers_all_nodes() {
        let registry = NodeRegistry::new();
        registry.register(test_node("w1")).await;
        registry.register(test_node("w2")).await;

        let report = registry.status_report().await;
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|status| status.accepting_tasks));
    }
}
