//! Bounded parallel execution over a batch of independent items
//!
//! At most `max_concurrency` operations are in flight at once. Results are
//! returned in submission order; callbacks observe completion order.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

type CompleteHook<'a, T> = Box<dyn Fn(usize, &T) + Send + Sync + 'a>;
type ErrorHook<'a, E> = Box<dyn Fn(usize, &E) + Send + Sync + 'a>;

/// Options for [`run_parallel`]
pub struct ParallelOptions<'a, T, E> {
    /// Maximum operations in flight
    pub max_concurrency: usize,
    /// Attempt every item even when some fail
    pub continue_on_error: bool,
    on_complete: Option<CompleteHook<'a, T>>,
    on_error: Option<ErrorHook<'a, E>>,
}

impl<T, E> std::fmt::Debug for ParallelOptions<'_, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelOptions")
            .field("max_concurrency", &self.max_concurrency)
            .field("continue_on_error", &self.continue_on_error)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<'a, T, E> ParallelOptions<'a, T, E> {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            continue_on_error: true,
            on_complete: None,
            on_error: None,
        }
    }

    /// Builder: abort on the first error instead of collecting it
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Builder: called with `(index, &value)` as each item succeeds
    pub fn on_complete(mut self, hook: impl Fn(usize, &T) + Send + Sync + 'a) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Builder: called with `(index, &error)` as each item fails
    pub fn on_error(mut self, hook: impl Fn(usize, &E) + Send + Sync + 'a) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Per-item results of a batch, indexed like the input
#[derive(Debug)]
pub struct BatchOutcome<T, E> {
    results: Vec<Result<T, E>>,
}

impl<T, E> BatchOutcome<T, E> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    pub fn results(&self) -> &[Result<T, E>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Result<T, E>> {
        self.results
    }

    /// Successful values keyed by input index
    pub fn successes(&self) -> impl Iterator<Item = (usize, &T)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().ok().map(|v| (i, v)))
    }

    /// Errors keyed by input index
    pub fn errors(&self) -> impl Iterator<Item = (usize, &E)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
    }
}

/// Run `operation` over every item with bounded concurrency
///
/// With `continue_on_error` the call always returns `Ok` holding one entry per
/// item. Without it, the first error drops the remaining in-flight work and is
/// returned directly.
pub async fn run_parallel<I, T, E, F, Fut>(
    items: Vec<I>,
    options: &ParallelOptions<'_, T, E>,
    operation: F,
) -> Result<BatchOutcome<T, E>, E>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut in_flight = FuturesUnordered::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let task = operation(index, item);
        in_flight.push(async move {
            // The semaphore is never closed, so acquisition only waits.
            let _permit = semaphore.acquire_owned().await;
            (index, task.await)
        });
    }

    let mut slots: Vec<Option<Result<T, E>>> = (0..total).map(|_| None).collect();

    while let Some((index, result)) = in_flight.next().await {
        match &result {
            Ok(value) => {
                if let Some(hook) = &options.on_complete {
                    hook(index, value);
                }
            }
            Err(error) => {
                if let Some(hook) = &options.on_error {
                    hook(index, error);
                }
            }
        }

        let result = match result {
            Err(error) if !options.continue_on_error => {
                tracing::debug!(index, total, "Aborting batch on first error");
                return Err(error);
            }
            other => other,
        };
        slots[index] = Some(result);
    }

    Ok(BatchOutcome {
        results: slots.into_iter().flatten().collect(),
    })
}
