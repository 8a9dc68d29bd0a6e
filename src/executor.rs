//! Bounded worker pools
//!
//! Two uses: fire-and-forget work off the request path (index writes), and
//! fan-out/fan-in over a completion service (per-member metadata fetches).
//! Width is bounded by a semaphore. Once pending work reaches
//! `threads * max_load_factor` the pool is overloaded: background work is
//! dropped and completion-service work runs inline on the caller.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

struct PoolState {
    name: &'static str,
    permits: Arc<Semaphore>,
    pending: AtomicUsize,
    max_pending: usize,
}

impl PoolState {
    fn is_overloaded(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }
}

/// Decrements the pending count however the task ends
struct PendingGuard(Arc<PoolState>);

impl PendingGuard {
    fn new(state: &Arc<PoolState>) -> Self {
        state.pending.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(state))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct WorkerPool {
    state: Arc<PoolState>,
    background: Mutex<JoinSet<()>>,
}

impl WorkerPool {
    pub fn new(name: &'static str, threads: usize, max_load_factor: usize) -> Self {
        let threads = threads.max(1);
        Self {
            state: Arc::new(PoolState {
                name,
                permits: Arc::new(Semaphore::new(threads)),
                pending: AtomicUsize::new(0),
                max_pending: threads.saturating_mul(max_load_factor.max(1)),
            }),
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.state.name
    }

    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    pub fn is_overloaded(&self) -> bool {
        self.state.is_overloaded()
    }

    /// Run `task` in the background. Returns false if the pool was
    /// overloaded and the task was dropped.
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.state.is_overloaded() {
            debug!("{} pool overloaded, dropping background task", self.state.name);
            return false;
        }

        let guard = PendingGuard::new(&self.state);
        let permits = Arc::clone(&self.state.permits);

        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        while background.try_join_next().is_some() {}
        background.spawn(async move {
            let _guard = guard;
            let _permit = permits.acquire_owned().await.ok();
            task.await;
        });
        true
    }

    /// Wait for every background task, including ones spawned while draining
    pub async fn drain(&self) {
        loop {
            let mut tasks = {
                let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *background)
            };
            if tasks.is_empty() {
                break;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!("{} background task failed: {}", self.state.name, e);
                }
            }
        }
    }

    pub fn completion_service<T: Send + 'static>(&self) -> CompletionService<T> {
        CompletionService {
            state: Arc::clone(&self.state),
            tasks: JoinSet::new(),
            done: Vec::new(),
        }
    }
}

/// Submit many tasks, then collect their results in completion order
pub struct CompletionService<T> {
    state: Arc<PoolState>,
    tasks: JoinSet<T>,
    done: Vec<T>,
}

impl<T: Send + 'static> CompletionService<T> {
    pub async fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.state.is_overloaded() {
            debug!("{} pool overloaded, running task inline", self.state.name);
            self.done.push(task.await);
            return;
        }

        let guard = PendingGuard::new(&self.state);
        let permits = Arc::clone(&self.state.permits);
        self.tasks.spawn(async move {
            let _guard = guard;
            let _permit = permits.acquire_owned().await.ok();
            task.await
        });
    }

    /// Every result that completed; failed tasks are logged and left out
    pub async fn drain(mut self) -> Vec<T> {
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(value) => self.done.push(value),
                Err(e) => warn!("{} task failed: {}", self.state.name, e),
            }
        }
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drain_waits_for_background_work() {
        let pool = WorkerPool::new("test", 2, 10);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            assert!(pool.execute(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn overloaded_pool_drops_background_work() {
        let pool = WorkerPool::new("test", 1, 1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        assert!(pool.execute(async move {
            let _ = rx.await;
        }));
        assert!(pool.is_overloaded());
        assert!(!pool.execute(async {}));

        tx.send(()).unwrap();
        pool.drain().await;
        assert!(!pool.is_overloaded());
    }

    #[tokio::test]
    async fn completion_service_collects_all_results() {
        let pool = WorkerPool::new("test", 3, 10);
        let mut service = pool.completion_service();

        for i in 0..6u64 {
            service
                .submit(async move {
                    tokio::time::sleep(Duration::from_millis(6 - i)).await;
                    i
                })
                .await;
        }

        let mut results = service.drain().await;
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn completion_service_runs_inline_when_overloaded() {
        let pool = WorkerPool::new("test", 1, 1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        pool.execute(async move {
            let _ = rx.await;
        });

        let mut service = pool.completion_service();
        service.submit(async { 7 }).await;
        assert_eq!(service.drain().await, vec![7]);

        tx.send(()).unwrap();
        pool.drain().await;
    }

    #[tokio::test]
    async fn panicking_task_is_skipped() {
        let pool = WorkerPool::new("test", 2, 10);
        let mut service = pool.completion_service();
        service.submit(async { 1 }).await;
        service
            .submit(async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                2
            })
            .await;

        assert_eq!(service.drain().await, vec![1]);
        assert_eq!(pool.pending(), 0);
    }
}
