//! Timers are plain tokio tasks. A chain runs its steps one after another in
//! a single task, so two ticks of the same chain are never in flight at once.
//!
//! Cancelling aborts the task at its next await point. A step that is already
//! running may finish, so every step re-checks that its owner still exists.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// What a chain step wants next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Again(Duration),
    Done,
}

#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Idempotent. Must not be called from inside the timer's own task.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn schedule_once<F>(delay: Duration, fut: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        fut.await;
    });
    TimerHandle { task }
}

/// Runs `step` after `first`, then again after whatever delay it returns,
/// until it returns `Tick::Done`.
pub fn schedule_chain<F, Fut>(first: Duration, mut step: F) -> TimerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Tick> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut delay = first;
        loop {
            tokio::time::sleep(delay).await;
            match step().await {
                Tick::Again(next) => delay = next,
                Tick::Done => break,
            }
        }
    });
    TimerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = schedule_once(Duration::from_secs(5), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = schedule_once(Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_runs_until_done() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let _handle = schedule_chain(Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                    Tick::Again(Duration::from_secs(1))
                } else {
                    Tick::Done
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
