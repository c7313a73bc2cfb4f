//! Counted barrier for outstanding insight tasks.
//!
//! Every `add()` hands out a [`DrainToken`]; dropping the token is the
//! matching "done". `wait()` resolves once no tokens are alive.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Per-sink count of outstanding background tasks.
///
/// Clones share the same count.
#[derive(Debug, Clone)]
pub struct DrainGroup {
    tx: Arc<watch::Sender<usize>>,
}

impl Default for DrainGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl DrainGroup {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Registers one outstanding task.
    pub fn add(&self) -> DrainToken {
        self.tx.send_modify(|count| *count += 1);
        DrainToken {
            tx: self.tx.clone(),
        }
    }

    /// Number of tasks not yet done.
    pub fn outstanding(&self) -> usize {
        *self.tx.borrow()
    }

    /// Suspends until the outstanding count reaches zero.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if everything drained in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

/// Marks one outstanding task. Dropping it marks the task done.
#[derive(Debug)]
pub struct DrainToken {
    tx: Arc<watch::Sender<usize>>,
}

impl Drop for DrainToken {
    fn drop(&mut self) {
        self.tx
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}
