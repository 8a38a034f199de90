//! Concurrency-limited pool of in-flight futures.
//!
//! Futures are pushed as they become ready and drained in completion order.
//! A semaphore caps how many run at once; the rest wait for a permit inside
//! their own future, so pushing never blocks.

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{Future, FutureExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Position of an item within the pool's lifetime, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext {
    /// 1-indexed dispatch number
    pub dispatch_number: usize,
    /// Items running or waiting when this one was pushed (itself included)
    pub in_flight: usize,
}

pub struct DispatchPool<'a, R> {
    semaphore: Arc<Semaphore>,
    running: FuturesUnordered<BoxFuture<'a, R>>,
    dispatched: usize,
}

impl<'a, R: Send + 'a> DispatchPool<'a, R> {
    /// Pool that runs at most `max_concurrency` futures at a time (minimum 1)
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            running: FuturesUnordered::new(),
            dispatched: 0,
        }
    }

    /// Queue a future; `task` receives its dispatch context once it holds a
    /// permit
    pub fn push<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(DispatchContext) -> Fut + Send + 'a,
        Fut: Future<Output = R> + Send + 'a,
    {
        self.dispatched += 1;
        let ctx = DispatchContext {
            dispatch_number: self.dispatched,
            in_flight: self.running.len() + 1,
        };
        let semaphore = self.semaphore.clone();

        self.running.push(
            async move {
                // the semaphore is never closed, so this only waits
                let _permit = semaphore.acquire_owned().await.ok();
                task(ctx).await
            }
            .boxed(),
        );
    }

    /// Wait for the next future to finish; `None` once the pool is empty
    pub async fn next(&mut self) -> Option<R> {
        self.running.next().await
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Total futures pushed so far
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

/// Run every item through `executor` with at most `max_concurrency` running at
/// once. Results come back in completion order, not input order.
pub async fn execute_batch<T, F, Fut, R>(items: Vec<T>, max_concurrency: usize, executor: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T, DispatchContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
{
    let executor = &executor;
    let mut pool = DispatchPool::new(max_concurrency);
    for item in items {
        pool.push(move |ctx| executor(item, ctx));
    }

    let mut results = Vec::with_capacity(pool.len());
    while let Some(result) = pool.next().await {
        results.push(result);
    }
    results
}
