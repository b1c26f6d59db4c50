//! Liveness coordination for one wallet engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Engine-level liveness flag.
///
/// Cloning shares the flag. Long-running tasks poll [`Liveness::is_alive`] before starting
/// new work and can await [`Liveness::cleared`] to wake up promptly on stop.
#[derive(Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Liveness {
    /// Create a flag in the stopped state.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            alive: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the engine as running. Returns false if it already was.
    pub fn set_alive(&self) -> bool {
        !self.alive.swap(true, Ordering::AcqRel)
    }

    /// Clear the flag and wake every waiter. Returns false if it was already cleared.
    pub fn clear(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        let _ = self.tx.send(());
        was_alive
    }

    /// Resolve once the flag is cleared.
    pub async fn cleared(&self) {
        let mut rx = self.tx.subscribe();
        // Subscribe first so a clear between the check and the await is not missed.
        if !self.is_alive() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Liveness").field("alive", &self.is_alive()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transitions() {
        let liveness = Liveness::new();
        assert!(!liveness.is_alive());
        assert!(liveness.set_alive());
        assert!(!liveness.set_alive());
        assert!(liveness.clone().clear());
        assert!(!liveness.is_alive());
        assert!(!liveness.clear());
    }

    #[tokio::test]
    async fn test_cleared_wakes_waiter() {
        let liveness = Liveness::new();
        liveness.set_alive();

        let waiter = {
            let liveness = liveness.clone();
            tokio::spawn(async move { liveness.cleared().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        liveness.clear();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleared_returns_immediately_when_stopped() {
        Liveness::new().cleared().await;
    }
}
