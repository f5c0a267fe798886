//! Connectivity monitoring abstraction.

use tokio::sync::watch;

/// Reports the current online/offline state and emits transitions.
///
/// Platform integrations (NetworkManager, a mobile reachability API)
/// implement this; tests use [`ManualConnectivity`].
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns the current connectivity state.
    fn is_online(&self) -> bool;

    /// Returns a receiver that observes connectivity transitions.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// A connectivity source driven by explicit state changes.
///
/// Useful for tests and for platforms where connectivity events arrive
/// through an external callback that simply calls [`set_online`].
///
/// [`set_online`]: ManualConnectivity::set_online
#[derive(Debug)]
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    /// Updates the connectivity state, notifying watchers on change.
    pub fn set_online(&self, online: bool) {
        // send_if_modified avoids waking watchers on repeated reports
        // of the same state.
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_current_state() {
        let monitor = ManualConnectivity::new(false);
        assert!(!monitor.is_online());

        monitor.set_online(true);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn watchers_observe_transitions() {
        let monitor = ManualConnectivity::new(false);
        let mut rx = monitor.watch();

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        // Repeating the same state does not wake watchers.
        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
