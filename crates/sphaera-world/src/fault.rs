//! Process-wide fatal fault notification.

use std::sync::Arc;

use tokio::sync::watch;

/// Latches the first fatal failure and lets any number of observers wait
/// for it.
///
/// Background loads have no caller to return an error to; they raise it here
/// instead and the process entry point shuts down.
#[derive(Clone)]
pub struct FaultSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for FaultSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultSignal {
    /// Create a signal in the healthy state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record a fault. Only the first one is kept.
    pub fn raise(&self, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            tracing::error!("Fatal world fault: {reason}");
            *current = Some(reason);
            true
        });
    }

    /// The recorded fault, if any.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fault_wins() {
        let signal = FaultSignal::new();
        assert!(signal.current().is_none());
        signal.raise("disk on fire");
        signal.raise("second");
        assert_eq!(signal.current().as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_subscriber_sees_fault() {
        let signal = FaultSignal::new();
        let rx = signal.subscribe();
        signal.clone().raise("gone");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().as_deref(), Some("gone"));
    }
}
