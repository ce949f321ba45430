//! Worker Pool (spec.md §4.9): fixed worker count, bounded task queue, two
//! back-pressure policies selected at construction.

use crate::error::{TradingError, TradingResult};
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Task = BoxFuture<'static, ()>;

pub struct WorkerPool {
    sender: Option<mpsc::Sender<Task>>,
    drop_on_full: bool,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(workers: usize, queue_capacity: usize, drop_on_full: bool) -> Self {
        let (tx, rx) = mpsc::channel::<Task>(queue_capacity.max(1));
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let task = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match task {
                        Some(task) => task.await,
                        None => break,
                    }
                }
            }));
        }

        Self {
            sender: Some(tx),
            drop_on_full,
            workers: handles,
        }
    }

    /// With `drop_on_full=true`, returns an error exactly when the queue is
    /// full; with `drop_on_full=false`, returns only after acceptance or
    /// shutdown (spec.md P7).
    pub async fn submit(&self, task: Task) -> TradingResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| TradingError::Validation("worker pool is shut down".to_string()))?;

        if self.drop_on_full {
            sender
                .try_send(task)
                .map_err(|_| TradingError::RateLimited("task queue full".to_string()))
        } else {
            sender
                .send(task)
                .await
                .map_err(|_| TradingError::Validation("worker pool is shut down".to_string()))
        }
    }

    /// Closes the queue and joins; queued tasks drain before exit.
    pub async fn stop(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// S5 — worker pool bounded (spec.md §8), adapted to the bounded-channel
    /// model: `workers=2, queue=1` means two tasks run immediately and one
    /// more can sit in the queue before `Submit` starts rejecting.
    #[tokio::test]
    async fn s5_worker_pool_bounded() {
        let pool = WorkerPool::start(2, 1, true);
        let never = || Box::pin(std::future::pending::<()>()) as BoxFuture<'static, ()>;

        pool.submit(never()).await.unwrap();
        pool.submit(never()).await.unwrap();
        // both workers are now permanently busy; one slot remains in the queue.
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.submit(never()).await.unwrap();

        let err = pool.submit(never()).await.unwrap_err();
        assert!(err.to_string().contains("task queue full"));
    }

    #[tokio::test]
    async fn non_blocking_policy_waits_for_room() {
        let pool = WorkerPool::start(1, 1, false);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            pool.submit(Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();
        }

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
