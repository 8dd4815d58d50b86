//! Error types for the retirement control loop.
//!
//! Channel failures carry their own taxonomy because callers need to tell a
//! closed channel (expected during teardown) from a transport fault. Cluster
//! API failures are opaque to the core and travel as `anyhow::Error`.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a control channel to the remote agent process.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is no longer open.
    #[error("channel closed")]
    Closed,

    /// The remote side did not respond within the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (I/O error, protocol violation).
    #[error("transport error: {0}")]
    Transport(String),
}
