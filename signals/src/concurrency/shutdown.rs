//! Shutdown signaling for the pipeline run loop.
//!
//! Abstracts a tokio watch channel into a shutdown signal shared between the
//! pipeline handle and its worker. The signal carries no payload, all receivers
//! are notified simultaneously when an operator-issued drain is requested.

use tokio::sync::watch;
use tokio::sync::watch::error::SendError;

/// Transmitter side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Signals shutdown to all receivers.
    ///
    /// Fails only when every receiver has already been dropped, in which case
    /// there is nothing left to shut down.
    pub fn shutdown(&self) -> Result<(), SendError<()>> {
        self.0.send(())
    }

    /// Creates a new receiver subscribed to this channel.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<()>;

/// Creates a new shutdown channel.
///
/// The channel starts unsignaled; receivers observe the shutdown only after a
/// send. Dropping the transmitter also wakes receivers, which is treated the same
/// as an explicit shutdown.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());

    (ShutdownTx(tx), rx)
}
