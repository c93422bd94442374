//! Process shutdown signalling.
//!
//! `Shutdown` turns Ctrl+C into a broadcast the runtime races against the
//! delivery pipeline, which has no cancellation points of its own.

// External crates
use tokio::signal;
use tokio::sync::broadcast;
use tracing::instrument;

/// Shutdown manager, built on-top of a broadcast channel
///
/// - Calling `.trigger()` sends the shutdown signal to every receiver.
/// - `.subscribe()` hands out an independent receiver.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Creates a new shutdown broadcast channel.
    /// A small buffer size is sufficient since only one message is sent.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    /// Returns a new receiver handle
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown event, notifying all receivers
    #[instrument(
        name = "log_forwarder_shutdown_trigger",
        target = "helpers::shutdown",
        level = "trace",
        skip_all
    )]
    pub fn trigger(&self) {
        tracing::trace!("Shutdown triggered, notifying subscribers");
        let _ = self.tx.send(());
    }

    /// Spawn a background task that triggers shutdown on Ctrl+C.
    pub fn listen_for_ctrl_c(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Ctrl+C signal detected, broadcasting shutdown");
                    shutdown.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                }
            }
        });
    }
}
