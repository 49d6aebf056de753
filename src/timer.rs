//! Single-slot trailing debounce timer.
//!
//! `arm` cancels whatever is pending and schedules `action` to run once
//! `delay` has passed with no further `arm`. There is never more than one
//! pending action per `Debouncer`.
//!
//! The action itself should be quick. Long-running work (a network write)
//! belongs in its own task so a later `arm` cannot abort it halfway.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::scope::SessionScope;

pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Cancel-then-schedule.
    pub fn arm<F>(&mut self, scope: &SessionScope, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(scope.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    /// Drop the pending action, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
