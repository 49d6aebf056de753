//! Cancellation scope tied to a room session's lifetime.
//!
//! DESIGN
//! ======
//! Every background task a session starts (subscription pumps, profile
//! lookups, snapshot writes, debounce timers) is spawned through its
//! `SessionScope`. Leaving the room cancels the scope's token, and each
//! task abandons its work at the next await point. Completion callbacks
//! therefore never run against a room the user has already left.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cloneable handle; all clones share one cancellation token.
#[derive(Clone, Default)]
pub struct SessionScope {
    token: CancellationToken,
}

impl SessionScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut`, racing it against scope cancellation.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = fut => {}
            }
        })
    }

    /// Abandon every task spawned through this scope.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::time::{Duration, sleep};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spawned_task_runs_to_completion() {
        let scope = SessionScope::new();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        scope
            .spawn(async move { flag.store(true, Ordering::SeqCst) })
            .await
            .unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_abandons_pending_work() {
        let scope = SessionScope::new();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let handle = scope.spawn(async move {
            sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(1)).await;
        scope.cancel();
        handle.await.unwrap();
        sleep(Duration::from_secs(10)).await;

        assert!(scope.is_cancelled());
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn spawn_after_cancel_never_runs() {
        let scope = SessionScope::new();
        scope.cancel();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        scope
            .spawn(async move { flag.store(true, Ordering::SeqCst) })
            .await
            .unwrap();
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn clones_share_cancellation() {
        let scope = SessionScope::new();
        let clone = scope.clone();
        clone.cancel();
        assert!(scope.is_cancelled());
    }
}
