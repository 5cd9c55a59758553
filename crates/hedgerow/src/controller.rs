// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::pin;

use futures::future::{Either, select, select_all};
use sundial::Clock;

use crate::args::OnHedgingArgs;
use crate::callbacks::HedgeCallback;
use crate::execution::AttemptExecution;
use crate::mode::LaunchPlan;
use crate::{Attempt, AttemptPool, Error, HedgingOptions, Outcome, ResilienceContext};

/// Per-invocation owner of the hedged attempts.
///
/// The controller launches attempts in strict index order, observes their
/// completions in arrival order, and commits the first outcome the validator
/// accepts. It exists for exactly one [`execute`] call; teardown always runs,
/// cancelling whatever is still in flight and recycling every attempt into
/// the pool.
pub(crate) struct HedgingController<'a, T, S> {
    options: &'a HedgingOptions<T, S>,
    clock: Clock,
    pool: &'a AttemptPool<T>,
    primary_context: ResilienceContext,
    running: Vec<AttemptExecution<T>>,
    settled: Vec<AttemptExecution<T>>,
    accepted: Option<AttemptExecution<T>>,
    launched: u32,
    exhausted: bool,
}

/// The result of trying to add one more attempt.
enum LoadNext<T> {
    /// A new attempt is now running.
    Loaded,

    /// Nothing new can launch; attempts already in flight keep running.
    NoMoreAttempts,

    /// Nothing is in flight and nothing more can launch: the most recent
    /// rejected outcome becomes the final word.
    Finished(Outcome<T>),
}

impl<'a, T, S> HedgingController<'a, T, S>
where
    T: Send + 'static,
    S: Clone + Send + 'static,
{
    pub(crate) fn new(
        options: &'a HedgingOptions<T, S>,
        clock: Clock,
        pool: &'a AttemptPool<T>,
        primary_context: ResilienceContext,
    ) -> Self {
        Self {
            options,
            clock,
            pool,
            primary_context,
            running: Vec::new(),
            settled: Vec::new(),
            accepted: None,
            launched: 0,
            exhausted: false,
        }
    }

    /// Drives the hedged execution to its final outcome.
    ///
    /// Cancellation-safe: dropping this future mid-await leaves the
    /// controller in a state [`dispose`][Self::dispose] can tear down.
    pub(crate) async fn run(&mut self, callback: &HedgeCallback<T, S>, state: &S) -> Outcome<T> {
        let first = self.load_next(callback, state);
        debug_assert!(
            matches!(first, LoadNext::Loaded),
            "the primary attempt always launches"
        );

        loop {
            if let Some(mut execution) = self.try_wait_for_completion().await {
                let verdict = {
                    let outcome = execution.outcome().expect("a waited attempt carries its outcome");
                    self.options.validator.call(outcome)
                };

                if verdict.is_accept() {
                    let outcome = execution.accept_outcome();
                    self.accepted = Some(execution);
                    return outcome;
                }

                // A rejected outcome is used up: set the attempt aside and
                // either keep waiting or hedge further.
                self.settled.push(execution);
            } else {
                match self.load_next(callback, state) {
                    LoadNext::Loaded | LoadNext::NoMoreAttempts => {}
                    LoadNext::Finished(outcome) => return outcome,
                }
            }
        }
    }

    /// Attempts to add the next attempt to the running set.
    fn load_next(&mut self, callback: &HedgeCallback<T, S>, state: &S) -> LoadNext<T> {
        if !self.exhausted && self.launched < self.options.max_attempts {
            let attempt = next_attempt(self.launched, self.options.max_attempts);
            let mut execution = self.pool.acquire();

            if execution.initialize(
                attempt,
                &self.primary_context,
                callback,
                self.options.action_generator.as_ref(),
                state,
            ) {
                self.launched += 1;
                if !attempt.is_primary() {
                    self.observe_hedge(attempt);
                }
                self.running.push(execution);
                return LoadNext::Loaded;
            }

            // The generator declined this index: no further hedges launch.
            self.pool.release(execution);
            self.exhausted = true;
        } else {
            self.exhausted = true;
        }

        if self.running.is_empty() {
            // The primary always loads, so a drained controller has at least
            // one settled attempt to fall back on.
            if let Some(mut last) = self.settled.pop() {
                let outcome = last.accept_outcome();
                self.accepted = Some(last);
                return LoadNext::Finished(outcome);
            }
        }

        LoadNext::NoMoreAttempts
    }

    /// Returns a completed attempt to evaluate, or `None` when the caller
    /// should launch the next attempt instead.
    async fn try_wait_for_completion(&mut self) -> Option<AttemptExecution<T>> {
        // A completion that is already observable wins over everything else,
        // including an elapsed hedging delay.
        if let Some(index) = self.running.iter().position(AttemptExecution::is_finished) {
            let mut execution = self.running.swap_remove(index);
            execution.join().await;
            return Some(execution);
        }

        if self.running.is_empty() {
            return None;
        }

        // With the budget spent (or the generator done) there is nothing left
        // to launch; only a completion can make progress.
        if self.exhausted || self.launched >= self.options.max_attempts {
            return Some(self.wait_for_any().await);
        }

        match self
            .options
            .mode
            .plan_for(next_attempt(self.launched, self.options.max_attempts))
        {
            LaunchPlan::Immediate => None,
            LaunchPlan::OnCompletion => Some(self.wait_for_any().await),
            LaunchPlan::After(delay) => {
                let delay = pin!(self.clock.delay(delay));
                let completions = select_all(self.running.iter_mut().map(|e| Box::pin(e.join())));

                let result = match select(completions, delay).await {
                    Either::Left((((), index, remaining), _)) => {
                        drop(remaining);
                        Some(index)
                    }
                    // The delay elapsed first. Dropping the race arms cancels
                    // the pending joins and releases the delay's timer; the
                    // caller launches the next attempt.
                    Either::Right(_) => None,
                };
                result.map(|index| self.running.swap_remove(index))
            }
        }
    }

    /// Blocks until some running attempt completes and removes it.
    async fn wait_for_any(&mut self) -> AttemptExecution<T> {
        debug_assert!(!self.running.is_empty(), "waiting requires a running attempt");

        let ((), index, remaining) = select_all(self.running.iter_mut().map(|e| Box::pin(e.join()))).await;
        drop(remaining);

        self.running.swap_remove(index)
    }

    fn observe_hedge(&self, attempt: Attempt) {
        tracing::event!(
            name: "hedgerow.hedge",
            tracing::Level::DEBUG,
            resilience.attempt.index = attempt.index(),
            resilience.attempt.is_last = attempt.is_last(),
            "launching hedged attempt"
        );

        if let Some(on_hedging) = &self.options.on_hedging {
            // Observer only: detached, so a slow hook never delays the launch
            // and a panicking hook stays contained in its own task.
            drop(tokio::spawn(on_hedging.call(OnHedgingArgs { attempt })));
        }
    }

    /// Tears the invocation down.
    ///
    /// Commits the winner's properties to the caller's context, cancels every
    /// still-running attempt, waits for all tasks to reach quiescence, and
    /// returns every attempt, reset, to the pool.
    pub(crate) async fn dispose(&mut self) {
        debug_assert!(
            self.accepted.as_ref().is_none_or(AttemptExecution::is_accepted),
            "a committed winner carries the accepted mark"
        );

        if let Some(winner) = &self.accepted {
            self.primary_context.properties().merge_from(winner.context().properties());
        }

        if !self.running.is_empty() {
            tracing::trace!(outstanding = self.running.len(), "cancelling outstanding hedged attempts");
        }
        for execution in &self.running {
            execution.cancel();
        }

        let mut executions: Vec<_> = self.running.drain(..).chain(self.settled.drain(..)).collect();
        if let Some(winner) = self.accepted.take() {
            executions.push(winner);
        }

        for mut execution in executions {
            execution.reset().await;
            self.pool.release(execution);
        }
    }
}

fn next_attempt(launched: u32, max_attempts: u32) -> Attempt {
    let is_last = launched.saturating_add(1) >= max_attempts;

    if launched == 0 {
        Attempt::first(is_last)
    } else {
        Attempt::hedge(launched, is_last)
    }
}

/// Executes an operation with request hedging and returns the accepted
/// outcome.
///
/// The primary attempt launches immediately. Depending on the configured
/// [`HedgingMode`], up to `max_attempts - 1` hedges launch after it; the
/// first completed attempt whose outcome the validator accepts wins, the
/// rest are cancelled, and their results are discarded. When every attempt
/// completes rejected, the most recent outcome is returned unchanged.
///
/// Each attempt runs with its own derived context: a cancellation token
/// linked to `context`'s token, a copy of the caller's properties, and the
/// attempt tag. On commit, the winner's properties are merged back into
/// `context` (replacing on key collision) before this function returns.
///
/// Cancelling `context`'s token tears the whole execution down (every
/// attempt is cancelled and awaited) and yields a failure outcome carrying
/// a cancellation [`Error`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use hedgerow::{AttemptPool, HedgingMode, HedgingOptions, Outcome, ResilienceContext, Verdict, execute};
/// use sundial::Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let options = HedgingOptions::new(|outcome: &Outcome<String>| {
///     if outcome.is_success() { Verdict::Accept } else { Verdict::Reject }
/// })
/// .max_attempts(3)
/// .mode(HedgingMode::after_delay(Duration::from_millis(50)));
///
/// let pool = AttemptPool::new();
/// let clock = Clock::system();
/// let context = ResilienceContext::new();
///
/// let outcome = execute(
///     &context,
///     |_context, name: String| async move { Outcome::Success(format!("hello, {name}")) },
///     "world".to_string(),
///     &options,
///     &clock,
///     &pool,
/// )
/// .await;
///
/// assert_eq!(outcome.success().map(String::as_str), Some("hello, world"));
/// # }
/// ```
pub async fn execute<T, S, F, Fut>(
    context: &ResilienceContext,
    callback: F,
    state: S,
    options: &HedgingOptions<T, S>,
    clock: &Clock,
    pool: &AttemptPool<T>,
) -> Outcome<T>
where
    T: Send + 'static,
    S: Clone + Send + 'static,
    F: Fn(ResilienceContext, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
{
    if context.cancellation().is_cancelled() {
        return Outcome::failure(Error::cancelled());
    }

    let callback = HedgeCallback::new(callback);
    let cancellation = context.cancellation().clone();
    let mut controller = HedgingController::new(options, clock.clone(), pool, context.clone());

    let outcome = {
        tokio::select! {
            biased;
            outcome = controller.run(&callback, &state) => Some(outcome),
            () = cancellation.cancelled() => None,
        }
    };

    controller.dispose().await;

    match outcome {
        Some(outcome) => outcome,
        None => Outcome::failure(Error::cancelled()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HedgingMode, Verdict};

    #[test]
    fn next_attempt_ordering() {
        let first = next_attempt(0, 3);
        assert!(first.is_primary());
        assert!(!first.is_last());

        let middle = next_attempt(1, 3);
        assert_eq!(middle.index(), 1);
        assert!(!middle.is_primary());
        assert!(!middle.is_last());

        let last = next_attempt(2, 3);
        assert!(last.is_last());
    }

    #[test]
    fn next_attempt_single_shot() {
        let only = next_attempt(0, 1);
        assert!(only.is_primary());
        assert!(only.is_last());
    }

    #[tokio::test]
    async fn none_accepted_marks_the_last_outcome() {
        let options: HedgingOptions<u32, ()> =
            HedgingOptions::new(|_| Verdict::Reject).max_attempts(2).mode(HedgingMode::parallel());
        let pool = AttemptPool::new();
        let callback: HedgeCallback<u32, ()> =
            HedgeCallback::new(|_, ()| async { Outcome::failure(std::io::Error::other("always fails")) });
        let mut controller = HedgingController::new(&options, Clock::system(), &pool, ResilienceContext::new());

        let outcome = controller.run(&callback, &()).await;

        assert!(outcome.is_failure());
        assert!(controller.accepted.as_ref().is_some_and(AttemptExecution::is_accepted));
        assert_eq!(controller.launched, 2);

        controller.dispose().await;
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn dispose_without_run_is_harmless() {
        let options: HedgingOptions<u32, ()> = HedgingOptions::new(|_| Verdict::Accept);
        let pool = AttemptPool::new();
        let mut controller = HedgingController::new(&options, Clock::system(), &pool, ResilienceContext::new());

        controller.dispose().await;

        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn accepted_winner_is_recycled_on_dispose() {
        let options: HedgingOptions<u32, ()> = HedgingOptions::new(|_| Verdict::Accept).max_attempts(1);
        let pool = AttemptPool::new();
        let callback: HedgeCallback<u32, ()> = HedgeCallback::new(|_, ()| async { Outcome::Success(1) });
        let mut controller = HedgingController::new(&options, Clock::system(), &pool, ResilienceContext::new());

        let outcome = controller.run(&callback, &()).await;
        controller.dispose().await;

        assert_eq!(outcome.success(), Some(&1));
        assert_eq!(pool.len(), 1);
        assert!(controller.accepted.is_none());
    }
}
