//! Bounded worker pool for running independent items concurrently

use futures::{stream::FuturesUnordered, Future, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Context provided to each item in a batch
#[derive(Debug, Clone, Copy)]
pub struct TaskContext {
    /// Position in the input (0-indexed)
    pub index: usize,
    /// Total number of items in this batch
    pub total: usize,
}

/// Execute items with at most `max_concurrency` in flight.
///
/// Results come back in input order regardless of completion order. There is
/// no fail-fast: every item runs to completion, so executors should encode
/// failure in `R` rather than abort siblings.
///
/// # Example
/// ```rust,ignore
/// let outputs = execute_batch(models, 2, |model, ctx| async move {
///     run_model(&model, ctx.index).await
/// })
/// .await;
/// ```
pub async fn execute_batch<T, F, Fut, R>(items: Vec<T>, max_concurrency: usize, executor: F) -> Vec<R>
where
    F: Fn(T, TaskContext) -> Fut,
    Fut: Future<Output = R>,
{
    let total = items.len();

    // Strictly one after another, in input order
    if max_concurrency <= 1 {
        let mut results = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            results.push(executor(item, TaskContext { index, total }).await);
        }
        return results;
    }

    let sem = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = FuturesUnordered::new();

    for (index, item) in items.into_iter().enumerate() {
        let sem = sem.clone();
        let fut = executor(item, TaskContext { index, total });

        tasks.push(async move {
            // Acquire permit (waits while max_concurrency items are running).
            // The semaphore is never closed, so a failed acquire just runs unbounded.
            let _permit = sem.acquire_owned().await.ok();
            (index, fut.await)
        });
    }

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    while let Some((index, result)) = tasks.next().await {
        slots[index] = Some(result);
    }

    slots.into_iter().flatten().collect()
}
