//! Network reachability as an injected capability.
//!
//! The host feeds connectivity changes in with [`NetworkMonitor::set_online`];
//! the pipeline reads the current value before every network lookup.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Shared online/offline flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    /// Creates a monitor with an initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        NetworkMonitor { tx: Arc::new(tx) }
    }

    /// A monitor that always reports online until told otherwise.
    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a connectivity change. Subscribers are notified only when
    /// the value actually changes.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Network reachability changed");
        }
    }

    /// Receiver for connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transitions_notify_subscribers() {
        let monitor = NetworkMonitor::online();
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());

        monitor.clone().set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
        assert!(!monitor.is_online());
    }
}
