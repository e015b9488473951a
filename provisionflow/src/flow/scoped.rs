//! Spawned tasks that are aborted when their handle is dropped.
//!
//! A dropped [`JoinHandle`] detaches its task. Composites own their children
//! through [`ScopedTask`] instead, so dropping or aborting a composite tears
//! down every task it started, and those tasks tear down theirs.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};

/// A [`JoinHandle`] that aborts its task on drop.
#[derive(Debug)]
pub(crate) struct ScopedTask<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> ScopedTask<T> {
    /// Spawns `future` on the current runtime.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl<T> Drop for ScopedTask<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<T> Future for ScopedTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_joined_task_yields_its_output() {
        let task = ScopedTask::spawn(async { 7 });
        assert_eq!(task.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dropping_the_handle_aborts_the_task() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let task = ScopedTask::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        drop(task);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_abort_reaches_grandchildren() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let outer = ScopedTask::spawn(async move {
            let inner = ScopedTask::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
            });
            let _ = inner.await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(outer);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!finished.load(Ordering::SeqCst));
    }
}
