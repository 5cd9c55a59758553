// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::args::{ActionArgs, OnHedgingArgs};
use crate::callbacks::{ActionGenerator, OnHedging, Validator};
use crate::{HedgeCallback, HedgingMode, Outcome, Verdict};

/// The default total attempt budget (primary plus one hedge).
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Configuration consumed by [`execute`][crate::execute].
///
/// The validator is the only required piece: it decides which outcomes are
/// acceptable, and thereby when the controller keeps hedging past a
/// completed-but-unsatisfying attempt. Everything else has defaults matching
/// the common case: a total budget of two attempts and a two-second hedging
/// delay.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use hedgerow::{HedgingMode, HedgingOptions, Outcome, Verdict};
///
/// let options: HedgingOptions<String, ()> = HedgingOptions::new(|outcome: &Outcome<String>| {
///     if outcome.is_success() { Verdict::Accept } else { Verdict::Reject }
/// })
/// .max_attempts(3)
/// .mode(HedgingMode::after_delay(Duration::from_millis(50)));
/// ```
#[derive(Debug)]
pub struct HedgingOptions<T, S> {
    pub(crate) max_attempts: u32,
    pub(crate) mode: HedgingMode,
    pub(crate) validator: Validator<T>,
    pub(crate) action_generator: Option<ActionGenerator<T, S>>,
    pub(crate) on_hedging: Option<OnHedging>,
}

impl<T, S> HedgingOptions<T, S> {
    /// Creates options with the given validator and defaults for everything
    /// else.
    pub fn new(validator: impl Fn(&Outcome<T>) -> Verdict + Send + Sync + 'static) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            mode: HedgingMode::default(),
            validator: Validator::new(validator),
            action_generator: None,
            on_hedging: None,
        }
    }

    /// Sets the total attempt budget, primary included.
    ///
    /// # Panics
    ///
    /// Panics when `value` is zero; at least the primary attempt must be
    /// allowed to run.
    #[must_use]
    pub fn max_attempts(mut self, value: u32) -> Self {
        assert!(value >= 1, "the attempt budget must allow at least the primary attempt");
        self.max_attempts = value;
        self
    }

    /// Sets when hedges launch relative to each other.
    #[must_use]
    pub fn mode(mut self, mode: HedgingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the factory deciding, per hedge, which callback to run.
    ///
    /// Returning `None` for an index stops any further hedges from launching;
    /// attempts already in flight keep running. Without a generator every
    /// hedge reuses the primary callback.
    #[must_use]
    pub fn action_generator(
        mut self,
        generator: impl Fn(ActionArgs<'_>) -> Option<HedgeCallback<T, S>> + Send + Sync + 'static,
    ) -> Self {
        self.action_generator = Some(ActionGenerator::new(generator));
        self
    }

    /// Sets an asynchronous observer invoked for each launched hedge.
    ///
    /// The hook is fire-and-forget: it runs detached from the launch, its
    /// completion is never awaited by the controller, and a panic inside it
    /// is contained.
    #[must_use]
    pub fn on_hedging<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(OnHedgingArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_hedging = Some(OnHedging::new(hook));
        self
    }
}
