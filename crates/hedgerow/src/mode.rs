// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::time::Duration;

use crate::Attempt;
use crate::args::HedgingDelayArgs;
use crate::callbacks::DelayFn;

/// The default delay before each hedge when no mode is configured.
pub(crate) const DEFAULT_HEDGING_DELAY: Duration = Duration::from_secs(2);

/// Defines when hedged attempts launch relative to each other.
///
/// - [`parallel()`][HedgingMode::parallel]: every attempt launches
///   immediately, a pure latency race.
/// - [`serial()`][HedgingMode::serial]: the next attempt launches only after
///   a running one completes with a rejected outcome; there is no
///   speculative fan-out at all.
/// - [`after_delay()`][HedgingMode::after_delay]: the next attempt launches
///   once a fixed delay elapses without an acceptable completion. A zero
///   delay behaves like `parallel()`.
/// - [`dynamic()`][HedgingMode::dynamic]: the delay is computed per attempt
///   by a callback; [`Duration::ZERO`] means launch immediately and
///   [`Duration::MAX`] means wait for a completion.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use hedgerow::HedgingMode;
///
/// // Launch every attempt at once.
/// let mode = HedgingMode::parallel();
///
/// // Give each attempt 50 ms before hedging further.
/// let mode = HedgingMode::after_delay(Duration::from_millis(50));
///
/// // Back off harder for later hedges.
/// let mode = HedgingMode::dynamic(|args| {
///     Duration::from_millis(50 * u64::from(args.attempt().index()))
/// });
/// ```
#[derive(Clone)]
pub struct HedgingMode {
    repr: ModeRepr,
}

#[derive(Clone)]
enum ModeRepr {
    Serial,
    Parallel,
    AfterDelay(Duration),
    Dynamic(DelayFn),
}

/// The wait loop's decision for one prospective attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaunchPlan {
    /// Launch the next attempt right away.
    Immediate,

    /// Launch the next attempt once this delay elapses without a completion.
    After(Duration),

    /// Launch the next attempt only after some running attempt completes.
    OnCompletion,
}

impl HedgingMode {
    /// Creates a mode that launches every attempt immediately.
    #[must_use]
    pub fn parallel() -> Self {
        Self {
            repr: ModeRepr::Parallel,
        }
    }

    /// Creates a mode that never launches speculatively: the next attempt
    /// starts only after a running one completes with a rejected outcome.
    #[must_use]
    pub fn serial() -> Self {
        Self { repr: ModeRepr::Serial }
    }

    /// Creates a mode that waits a fixed duration before each hedge.
    ///
    /// A zero duration is equivalent to [`parallel()`][HedgingMode::parallel].
    #[must_use]
    pub fn after_delay(delay: Duration) -> Self {
        Self {
            repr: ModeRepr::AfterDelay(delay),
        }
    }

    /// Creates a mode that computes the delay per attempt.
    ///
    /// The callback receives the tag of the attempt about to launch.
    /// [`Duration::ZERO`] launches it immediately; [`Duration::MAX`] waits
    /// for a completion instead.
    #[must_use]
    pub fn dynamic(delay_fn: impl Fn(HedgingDelayArgs) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            repr: ModeRepr::Dynamic(DelayFn::new(delay_fn)),
        }
    }

    pub(crate) fn plan_for(&self, attempt: Attempt) -> LaunchPlan {
        match &self.repr {
            ModeRepr::Parallel => LaunchPlan::Immediate,
            ModeRepr::Serial => LaunchPlan::OnCompletion,
            ModeRepr::AfterDelay(delay) => Self::plan_from_delay(*delay),
            ModeRepr::Dynamic(delay_fn) => Self::plan_from_delay(delay_fn.call(HedgingDelayArgs { attempt })),
        }
    }

    fn plan_from_delay(delay: Duration) -> LaunchPlan {
        if delay == Duration::ZERO {
            LaunchPlan::Immediate
        } else if delay == Duration::MAX {
            LaunchPlan::OnCompletion
        } else {
            LaunchPlan::After(delay)
        }
    }
}

impl Default for HedgingMode {
    fn default() -> Self {
        Self::after_delay(DEFAULT_HEDGING_DELAY)
    }
}

impl Debug for HedgingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ModeRepr::Serial => f.debug_struct("HedgingMode").field("mode", &"serial").finish(),
            ModeRepr::Parallel => f.debug_struct("HedgingMode").field("mode", &"parallel").finish(),
            ModeRepr::AfterDelay(delay) => f
                .debug_struct("HedgingMode")
                .field("mode", &"after_delay")
                .field("delay", delay)
                .finish(),
            ModeRepr::Dynamic(_) => f.debug_struct("HedgingMode").field("mode", &"dynamic").finish(),
        }
    }
}
