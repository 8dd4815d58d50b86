//! Cluster resource manager boundary.
//!
//! The cluster API abstracts whatever system runs the workload backing a
//! node (a job scheduler for containers or processes). The core only ever
//! asks it to stop a job; provisioning lives outside this crate.
//!
//! A mock implementation is provided for testing and development.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Interface to the external cluster resource manager.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Terminate the cluster job backing the named node. Idempotent on the
    /// cluster side; callers must still avoid blind retries because a failure
    /// leaves the prior outcome ambiguous.
    async fn stop_job(&self, node_name: &str, namespace: &str, token: &str) -> Result<()>;
}

/// A recorded `stop_job` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCall {
    pub node_name: String,
    pub namespace: String,
    pub token: String,
}

/// Mock cluster API for testing and development.
pub struct MockClusterApi {
    stops: Mutex<Vec<StopCall>>,
    fail_stops: bool,
}

impl MockClusterApi {
    /// Create a mock cluster API that accepts all stop requests.
    pub fn new() -> Self {
        Self {
            stops: Mutex::new(Vec::new()),
            fail_stops: false,
        }
    }

    /// Create a mock cluster API that fails all stop requests.
    pub fn failing() -> Self {
        Self {
            stops: Mutex::new(Vec::new()),
            fail_stops: true,
        }
    }

    /// Stop calls recorded so far, in order.
    pub fn stop_calls(&self) -> Vec<StopCall> {
        self.stops.lock().unwrap().clone()
    }
}

impl Default for MockClusterApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn stop_job(&self, node_name: &str, namespace: &str, token: &str) -> Result<()> {
        if self.fail_stops {
            anyhow::bail!("mock cluster configured to fail");
        }

        info!(node_name, namespace, "[MOCK] Stopping cluster job");
        self.stops.lock().unwrap().push(StopCall {
            node_name: node_name.to_string(),
            namespace: namespace.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_stop_calls() {
        let cluster = MockClusterApi::new();
        cluster.stop_job("w1", "builds", "tok").await.unwrap();

        let calls = cluster.stop_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].node_name, "w1");
        assert_eq!(calls[0].namespace, "builds");
    }

    #[tokio::test]
    async fn test_failing_mock_returns_error() {
        let cluster = MockClusterApi::failing();
        assert!(cluster.stop_job("w1", "builds", "tok").await.is_err());
        assert!(cluster.stop_calls().is_empty());
    }
}
