//! Subagent Spawner (spec.md §4.9): spawns analyst/risk/executor subagents
//! with per-call timeouts, a global concurrency cap, and a shared result
//! channel.

use crate::error::TradingError;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

pub struct SpawnResult<T> {
    pub id: Uuid,
    pub outcome: Result<T, TradingError>,
}

pub struct SubagentSpawner<T: Send + 'static> {
    semaphore: Arc<Semaphore>,
    timeout: std::time::Duration,
    cancel_tokens: Arc<DashMap<Uuid, CancellationToken>>,
    result_tx: Arc<std::sync::Mutex<Option<mpsc::Sender<SpawnResult<T>>>>>,
    closed: AtomicBool,
}

impl<T: Send + 'static> SubagentSpawner<T> {
    pub fn new(max_concurrency: usize, timeout: std::time::Duration, result_capacity: usize) -> (Self, mpsc::Receiver<SpawnResult<T>>) {
        let (tx, rx) = mpsc::channel(result_capacity);
        (
            Self {
                semaphore: Arc::new(Semaphore::new(max_concurrency)),
                timeout,
                cancel_tokens: Arc::new(DashMap::new()),
                result_tx: Arc::new(std::sync::Mutex::new(Some(tx))),
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Spawns `work`, registering a cancel token under `id`. The result
    /// lands on the shared bounded channel; if full, it is dropped with a
    /// log (spec.md §4.9). A no-op once the spawner is closed.
    pub fn spawn<F>(&self, id: Uuid, work: F)
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, TradingError>> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let Some(result_tx) = self.result_tx.lock().expect("spawner result_tx lock poisoned").clone() else {
            return;
        };

        let token = CancellationToken::new();
        self.cancel_tokens.insert(id, token.clone());

        let semaphore = self.semaphore.clone();
        let timeout = self.timeout;
        let cancel_tokens = self.cancel_tokens.clone();
        let child_token = token.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let fut = work(child_token.clone());
            let outcome = tokio::select! {
                result = tokio::time::timeout(timeout, fut) => match result {
                    Ok(inner) => inner,
                    Err(_) => Err(TradingError::Timeout(format!("subagent {id} timed out"))),
                },
                _ = child_token.cancelled() => {
                    Err(TradingError::Timeout(format!("subagent {id} cancelled")))
                }
            };

            cancel_tokens.remove(&id);

            if result_tx.try_send(SpawnResult { id, outcome }).is_err() {
                warn!(%id, "subagent spawner result channel full; dropping result");
            }
        });
    }

    pub fn cancel(&self, id: Uuid) {
        if let Some((_, token)) = self.cancel_tokens.remove(&id) {
            token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.cancel_tokens.iter() {
            entry.value().cancel();
        }
        self.cancel_tokens.clear();
    }

    /// Idempotent: cancels everything, drops the shared sender so the result
    /// channel closes once in-flight work finishes draining, and marks the
    /// spawner closed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_all();
        self.result_tx.lock().expect("spawner result_tx lock poisoned").take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn successful_spawn_delivers_result() {
        let (spawner, mut rx) = SubagentSpawner::<u32>::new(4, Duration::from_secs(1), 16);
        let id = Uuid::new_v4();
        spawner.spawn(id, |_token| Box::pin(async { Ok(42) }));
        let result = rx.recv().await.unwrap();
        assert_eq!(result.id, id);
        assert_eq!(result.outcome.unwrap(), 42);
    }

    #[tokio::test]
    async fn timeout_surfaces_as_timeout_error() {
        let (spawner, mut rx) = SubagentSpawner::<u32>::new(4, Duration::from_millis(20), 16);
        let id = Uuid::new_v4();
        spawner.spawn(id, |_token| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
        });
        let result = rx.recv().await.unwrap();
        assert!(result.outcome.is_err());
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_work() {
        let (spawner, mut rx) = SubagentSpawner::<u32>::new(4, Duration::from_secs(5), 16);
        let id = Uuid::new_v4();
        spawner.spawn(id, |token| {
            Box::pin(async move {
                token.cancelled().await;
                Ok(1)
            })
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        spawner.cancel(id);
        let result = rx.recv().await.unwrap();
        assert!(result.outcome.is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (spawner, _rx) = SubagentSpawner::<u32>::new(4, Duration::from_secs(1), 16);
        spawner.close();
        spawner.close();
    }

    #[tokio::test]
    async fn close_drops_sender_and_closes_channel() {
        let (spawner, mut rx) = SubagentSpawner::<u32>::new(4, Duration::from_secs(1), 16);
        spawner.close();
        assert!(rx.recv().await.is_none());
    }
}
