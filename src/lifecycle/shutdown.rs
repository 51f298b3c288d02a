//! Stop signals.
//!
//! One `Shutdown` per stage that has to be stopped on its own:
//! - the HTTP server's listener (owned by whoever runs `HttpServer::run`)
//! - the dispatcher's intake (owned by `LoadBalancer`)
//! - the health monitors (owned by `LoadBalancer`, fired only after
//!   in-flight forwards have drained)

use tokio::sync::broadcast;

/// A one-shot stop signal fanned out to every subscribed task.
///
/// Only subscribers that exist when `trigger` runs see the signal, so tasks
/// must subscribe before they are spawned. Dropping the owner also wakes
/// subscribers (`recv` returns `Closed`), so a task never outlives the
/// component that started it.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Firing with no subscribers left is not an error.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Tasks still holding a receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
