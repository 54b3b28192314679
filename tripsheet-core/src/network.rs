//! Shared online/offline flag with a reconnect signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Whether the remote services are reachable.
///
/// Cheap to clone; all clones share one flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the flag. Returns true when this call brought us back online.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.tx.send_replace(online);
        if was_online != online {
            tracing::info!("Network is now {}", if online { "online" } else { "offline" });
        }
        online && !was_online
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Waits for the next offline to online transition seen by `rx`.
///
/// Returns false if every [`Connectivity`] handle has been dropped.
pub async fn wait_for_reconnect(rx: &mut watch::Receiver<bool>) -> bool {
    let mut online = *rx.borrow_and_update();
    loop {
        if rx.changed().await.is_err() {
            return false;
        }
        let now_online = *rx.borrow_and_update();
        if now_online && !online {
            return true;
        }
        online = now_online;
    }
}
