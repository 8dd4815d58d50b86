//! One-shot reconnect suppression for the remote agent process.
//!
//! Before a channel is torn down the remote agent is told to stop
//! auto-reconnecting. Without this the remote process can re-establish a
//! connection to a node identity the controller has already begun
//! destroying. The notification is advisory: the subsequent teardown steps
//! reclaim the node whether or not it arrives.

use tracing::debug;

use crate::channel::{ControlChannel, ControlCommand};
use crate::error::ChannelError;

pub struct RemoteDisconnectNotifier;

impl RemoteDisconnectNotifier {
    /// Tell the remote agent to stop auto-reconnecting. A channel with no
    /// live remote end is a no-op success. Transport errors are returned to
    /// the caller, which logs and proceeds.
    pub async fn notify(channel: &dyn ControlChannel) -> Result<(), ChannelError> {
        if !channel.is_open() {
            // Nothing listening on the other end.
            return Ok(());
        }

        channel.send(ControlCommand::DisableReconnect).await?;
        debug!("Disabled remote agent reconnects");
        Ok(())
    }
}
