// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use parking_lot::Mutex;

use crate::execution::AttemptExecution;

const DEFAULT_CAPACITY: usize = 32;

/// A concurrent reuse cache for attempt executions.
///
/// The pool holds only *idle* executions; in-flight attempts are owned solely
/// by the controller of their invocation. [`execute`][crate::execute] draws
/// its slots from the pool and returns every one of them, reset, during
/// teardown, so a long-lived pool amortizes per-attempt allocations across
/// invocations.
///
/// The pool is safe to share across concurrent invocations. Releases beyond
/// the configured capacity are dropped.
///
/// # Examples
///
/// ```
/// use hedgerow::AttemptPool;
///
/// let pool: AttemptPool<String> = AttemptPool::with_capacity(8);
/// assert!(pool.is_empty());
/// ```
pub struct AttemptPool<T> {
    idle: Mutex<Vec<AttemptExecution<T>>>,
    capacity: usize,
}

impl<T: Send + 'static> AttemptPool<T> {
    /// Creates a pool with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a pool retaining at most `capacity` idle executions.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Returns the number of idle executions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Returns `true` when the pool holds no idle executions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idle.lock().is_empty()
    }

    /// Takes an idle execution, constructing a fresh one on miss.
    pub(crate) fn acquire(&self) -> AttemptExecution<T> {
        self.idle.lock().pop().unwrap_or_else(AttemptExecution::idle)
    }

    /// Returns an execution to the pool.
    ///
    /// The execution's task must have completed; handing back an in-flight
    /// attempt is an internal invariant violation and aborts.
    pub(crate) fn release(&self, execution: AttemptExecution<T>) {
        assert!(
            execution.is_finished(),
            "an attempt must complete before it returns to the pool"
        );

        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(execution);
        }
    }
}

impl<T: Send + 'static> Default for AttemptPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AttemptPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptPool")
            .field("idle", &self.idle.lock().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::callbacks::HedgeCallback;
    use crate::{Attempt, Outcome, ResilienceContext};

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(AttemptPool<u32>: Send, Sync);
    }

    #[test]
    fn acquire_on_miss_constructs_fresh() {
        let pool: AttemptPool<u32> = AttemptPool::new();

        let execution = pool.acquire();

        assert!(pool.is_empty());
        assert!(execution.is_finished());
    }

    #[test]
    fn release_then_acquire_reuses() {
        let pool: AttemptPool<u32> = AttemptPool::new();

        pool.release(pool.acquire());
        assert_eq!(pool.len(), 1);

        let _execution = pool.acquire();
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn capacity_bounds_retention() {
        let pool: AttemptPool<u32> = AttemptPool::with_capacity(1);

        pool.release(pool.acquire());
        pool.release(pool.acquire());

        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "must complete before it returns to the pool")]
    async fn release_of_in_flight_attempt_aborts() {
        let pool: AttemptPool<u32> = AttemptPool::new();
        let parent = ResilienceContext::new();
        let waits: HedgeCallback<u32, ()> = HedgeCallback::new(|context, ()| async move {
            context.cancellation().cancelled().await;
            Outcome::Success(0)
        });

        let mut execution = pool.acquire();
        execution.initialize(Attempt::first(true), &parent, &waits, None, &());

        pool.release(execution);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool: Arc<AttemptPool<u32>> = Arc::new(AttemptPool::with_capacity(64));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let execution = pool.acquire();
                        pool.release(execution);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker threads do not panic");
        }

        assert!(pool.len() <= 64);
    }
}
