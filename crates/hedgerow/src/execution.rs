// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::args::ActionArgs;
use crate::callbacks::{ActionGenerator, HedgeCallback};
use crate::{Attempt, Error, Outcome, ResilienceContext};

/// One speculative attempt of the hedged operation.
///
/// An execution owns the attempt's isolated context, the spawned task running
/// the user callback, and the completed outcome. Instances are recycled
/// through the [`AttemptPool`][crate::AttemptPool]: the controller acquires a
/// slot, initializes it, and returns it after [`reset`][Self::reset].
///
/// The spawned task is *never failing*: the user future runs under
/// `catch_unwind`, and whatever it produces (a captured panic included) is
/// materialized into the outcome slot before the task finishes. Awaiting the
/// join handle therefore needs no error handling anywhere in the controller.
pub(crate) struct AttemptExecution<T> {
    attempt: Attempt,
    context: ResilienceContext,
    task: Option<JoinHandle<()>>,
    slot: Arc<OutcomeSlot<T>>,
    outcome: Option<Outcome<T>>,
    accepted: bool,
}

/// Write-once handoff cell between the spawned task and the controller.
struct OutcomeSlot<T>(Mutex<Option<Outcome<T>>>);

impl<T> Default for OutcomeSlot<T> {
    fn default() -> Self {
        Self(Mutex::new(None))
    }
}

impl<T> OutcomeSlot<T> {
    fn set(&self, outcome: Outcome<T>) {
        *self.0.lock() = Some(outcome);
    }

    fn take(&self) -> Option<Outcome<T>> {
        self.0.lock().take()
    }
}

impl<T: Send + 'static> AttemptExecution<T> {
    /// Creates an idle slot with no task and no outcome.
    pub(crate) fn idle() -> Self {
        Self {
            attempt: Attempt::default(),
            context: ResilienceContext::new(),
            task: None,
            slot: Arc::new(OutcomeSlot::default()),
            outcome: None,
            accepted: false,
        }
    }

    /// Prepares and launches this attempt.
    ///
    /// For a hedge, the action generator (when present) is consulted first;
    /// a declined hedge leaves the slot untouched and returns `false`. On
    /// `true`, the attempt's context is derived from the parent (child
    /// cancellation token, copied properties, attempt tag) and the callback
    /// is spawned as a never-failing task.
    pub(crate) fn initialize<S>(
        &mut self,
        attempt: Attempt,
        parent: &ResilienceContext,
        callback: &HedgeCallback<T, S>,
        generator: Option<&ActionGenerator<T, S>>,
        state: &S,
    ) -> bool
    where
        S: Clone + Send + 'static,
    {
        let action = match generator {
            Some(generator) if !attempt.is_primary() => {
                let args = ActionArgs {
                    attempt,
                    context: parent,
                };
                match generator.call(args) {
                    Some(action) => action,
                    None => return false,
                }
            }
            _ => callback.clone(),
        };

        self.attempt = attempt;
        self.context = parent.hedged_view(attempt);
        self.outcome = None;
        self.accepted = false;
        self.slot = Arc::new(OutcomeSlot::default());

        let future = action.call(self.context.clone(), state.clone());
        let slot = Arc::clone(&self.slot);
        self.task = Some(tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Outcome::failure(Error::attempt_panic(payload)),
            };

            // The outcome must be observable before the handle reports
            // completion; storing it is the task's final act.
            slot.set(outcome);
        }));

        true
    }

    /// Signals this attempt's child cancellation token.
    ///
    /// Idempotent and non-blocking; siblings and the parent are unaffected.
    pub(crate) fn cancel(&self) {
        self.context.cancellation().cancel();
    }

    /// Returns `true` once the spawned task has completed (or none was ever
    /// launched).
    pub(crate) fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the spawned task and moves its outcome into this execution.
    ///
    /// Idempotent; completed executions return immediately.
    pub(crate) async fn join(&mut self) {
        if let Some(task) = &mut self.task {
            // Infallible by the never-failing-task contract.
            let _ = task.await;
            self.task = None;
        }

        if self.outcome.is_none() {
            self.outcome = self.slot.take();
        }
    }

    /// Returns the completed outcome, when the task has been joined.
    pub(crate) fn outcome(&self) -> Option<&Outcome<T>> {
        self.outcome.as_ref()
    }

    /// Commits this attempt as the winner and yields its outcome.
    ///
    /// Irreversible. Panics when no outcome is present; the controller only
    /// accepts attempts it has already joined.
    pub(crate) fn accept_outcome(&mut self) -> Outcome<T> {
        self.accepted = true;
        self.outcome
            .take()
            .expect("accepting an attempt requires a completed outcome")
    }

    /// Returns `true` when this attempt was committed as the winner.
    pub(crate) fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Returns the tag this attempt ran as.
    pub(crate) fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Returns this attempt's isolated context.
    pub(crate) fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// Returns the execution to a reusable zero state.
    ///
    /// Waits for the task to complete first, so a reset execution can always
    /// be returned to the pool.
    pub(crate) async fn reset(&mut self) {
        self.join().await;

        self.attempt = Attempt::default();
        self.context = ResilienceContext::new();
        self.outcome = None;
        self.accepted = false;
        self.slot = Arc::new(OutcomeSlot::default());
    }
}

impl<T> fmt::Debug for AttemptExecution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptExecution")
            .field("attempt", &self.attempt)
            .field("running", &self.task.is_some())
            .field("accepted", &self.accepted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verdict;

    fn callback() -> HedgeCallback<u32, u32> {
        HedgeCallback::new(|_context, state| async move { Outcome::Success(state) })
    }

    #[tokio::test]
    async fn initialize_runs_callback_to_outcome() {
        let parent = ResilienceContext::new();
        let mut execution = AttemptExecution::idle();

        assert!(execution.initialize(Attempt::first(true), &parent, &callback(), None, &7));
        execution.join().await;

        assert_eq!(execution.outcome().unwrap().success(), Some(&7));
        assert!(execution.is_finished());
    }

    #[tokio::test]
    async fn attempt_context_carries_tag_and_child_token() {
        let parent = ResilienceContext::new();
        let observed: HedgeCallback<u32, ()> = HedgeCallback::new(|context, ()| async move {
            Outcome::Success(context.attempt().index())
        });
        let mut execution = AttemptExecution::idle();

        execution.initialize(Attempt::hedge(2, true), &parent, &observed, None, &());
        execution.join().await;

        assert_eq!(execution.outcome().unwrap().success(), Some(&2));
        assert_eq!(execution.context().attempt().index(), 2);
    }

    #[tokio::test]
    async fn generator_decline_leaves_slot_untouched() {
        let parent = ResilienceContext::new();
        let generator: ActionGenerator<u32, u32> = ActionGenerator::new(|_| None);
        let mut execution = AttemptExecution::<u32>::idle();

        let launched = execution.initialize(Attempt::hedge(1, false), &parent, &callback(), Some(&generator), &0);

        assert!(!launched);
        assert!(execution.is_finished());
        assert!(execution.outcome().is_none());
    }

    #[tokio::test]
    async fn generator_is_not_consulted_for_primary() {
        let parent = ResilienceContext::new();
        let generator: ActionGenerator<u32, u32> = ActionGenerator::new(|_| None);
        let mut execution = AttemptExecution::idle();

        let launched = execution.initialize(Attempt::first(false), &parent, &callback(), Some(&generator), &1);

        assert!(launched);
        execution.join().await;
        assert_eq!(execution.outcome().unwrap().success(), Some(&1));
    }

    #[tokio::test]
    async fn panic_is_materialized_into_failure() {
        let parent = ResilienceContext::new();
        let panicking: HedgeCallback<u32, ()> = HedgeCallback::new(|_, ()| async { panic!("attempt blew up") });
        let mut execution = AttemptExecution::idle();

        execution.initialize(Attempt::first(true), &parent, &panicking, None, &());
        execution.join().await;

        let outcome = execution.outcome().unwrap();
        let error = outcome.error().unwrap().downcast_ref::<Error>().unwrap();
        assert!(error.is_attempt_panic());
        assert!(error.to_string().contains("attempt blew up"));
    }

    #[tokio::test]
    async fn cancel_reaches_the_callback_and_spares_the_parent() {
        let parent = ResilienceContext::new();
        let waits: HedgeCallback<u32, ()> = HedgeCallback::new(|context, ()| async move {
            context.cancellation().cancelled().await;
            Outcome::Success(99)
        });
        let mut execution = AttemptExecution::idle();
        execution.initialize(Attempt::first(true), &parent, &waits, None, &());

        execution.cancel();
        execution.cancel(); // idempotent
        execution.join().await;

        assert_eq!(execution.outcome().unwrap().success(), Some(&99));
        assert!(!parent.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn accept_outcome_marks_and_yields() {
        let parent = ResilienceContext::new();
        let mut execution = AttemptExecution::idle();
        execution.initialize(Attempt::first(true), &parent, &callback(), None, &5);
        execution.join().await;

        let outcome = execution.accept_outcome();

        assert!(execution.is_accepted());
        assert_eq!(outcome.success(), Some(&5));
        assert!(execution.outcome().is_none());
    }

    #[test]
    #[should_panic(expected = "requires a completed outcome")]
    fn accept_without_outcome_panics() {
        let mut execution = AttemptExecution::<u32>::idle();
        let _ = execution.accept_outcome();
    }

    #[tokio::test]
    async fn reset_returns_to_zero_state() {
        let parent = ResilienceContext::new();
        parent.properties().insert("seed", 1u32);
        let mut execution = AttemptExecution::idle();
        execution.initialize(Attempt::hedge(1, true), &parent, &callback(), None, &3);
        execution.join().await;
        let _ = execution.accept_outcome();

        execution.reset().await;

        assert!(execution.is_finished());
        assert!(execution.outcome().is_none());
        assert!(!execution.is_accepted());
        assert!(execution.attempt().is_primary());
        assert!(execution.context().properties().is_empty());
    }

    #[tokio::test]
    async fn validator_sees_the_stored_outcome() {
        let parent = ResilienceContext::new();
        let mut execution = AttemptExecution::idle();
        execution.initialize(Attempt::first(true), &parent, &callback(), None, &4);
        execution.join().await;

        let verdict = if execution.outcome().unwrap().success() == Some(&4) {
            Verdict::Accept
        } else {
            Verdict::Reject
        };

        assert!(verdict.is_accept());
    }
}
