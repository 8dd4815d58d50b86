//! Control channel boundary to the remote agent process.
//!
//! The channel abstracts whatever transport connects the controller to the
//! long-lived agent process running on the node. Teardown only needs three
//! operations: check liveness, send a control command, and disconnect.
//!
//! A mock implementation is provided for testing and development.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ChannelError;

/// Instruction sent to the remote agent over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop attempting automatic reconnects. Sent just before the channel is
    /// torn down so the remote process does not race the controller by
    /// re-establishing a connection to a node identity being destroyed.
    DisableReconnect,
}

/// Why a channel is being torn down. Carried to the remote side as the
/// offline reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The node was retired by the lifecycle controller.
    Retired,
}

impl std::fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retired => write!(f, "node retired by lifecycle controller"),
        }
    }
}

/// Live connection to the remote agent process.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Send a control command to the remote agent.
    async fn send(&self, command: ControlCommand) -> Result<(), ChannelError>;

    /// Tear the channel down. May take arbitrarily long for a hung remote;
    /// callers bound the wait themselves.
    async fn disconnect(&self, cause: DisconnectCause) -> Result<(), ChannelError>;
}

/// Mock control channel for testing and development.
pub struct MockControlChannel {
    open: AtomicBool,
    fail_sends: bool,
    hang_disconnect: bool,
    sent: Mutex<Vec<ControlCommand>>,
}

impl MockControlChannel {
    /// Create an open mock channel.
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            fail_sends: false,
            hang_disconnect: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock channel whose sends always fail.
    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    /// Create a mock channel whose disconnect never completes.
    pub fn hanging_disconnect() -> Self {
        Self {
            hang_disconnect: true,
            ..Self::new()
        }
    }

    /// Create a mock channel that is already closed.
    pub fn closed() -> Self {
        let channel = Self::new();
        channel.open.store(false, Ordering::SeqCst);
        channel
    }

    /// Commands sent so far, in order.
    pub fn sent_commands(&self) -> Vec<ControlCommand> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlChannel for MockControlChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, command: ControlCommand) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        if self.fail_sends {
            return Err(ChannelError::Transport("mock send failure".to_string()));
        }
        debug!(?command, "[MOCK] Sent control command");
        self.sent.lock().unwrap().push(command);
        Ok(())
    }

    async fn disconnect(&self, cause: DisconnectCause) -> Result<(), ChannelError> {
        if self.hang_disconnect {
            std::future::pending::<()>().await;
        }
        debug!(%cause, "[MOCK] Channel disconnected");
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}
