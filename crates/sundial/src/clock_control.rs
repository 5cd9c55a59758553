// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Mutex};
use std::task::Waker;
use std::time::{Duration, Instant};

use crate::{Clock, TimerKey, Timers};

/// Controls the flow of time in tests.
///
/// Use [`ClockControl::to_clock`] to obtain a [`Clock`] whose time only moves
/// when the control says so. This makes time-sensitive tests fast and
/// deterministic: instead of sleeping, a test advances the clock and every
/// delay whose deadline was reached fires immediately.
///
/// Never hand a controlled clock to production code; its time stands still.
///
/// # Examples
///
/// ## Advancing time manually
///
/// ```
/// use std::time::Duration;
///
/// use sundial::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let before = clock.instant();
/// control.advance(Duration::from_secs(1));
///
/// assert_eq!(clock.instant() - before, Duration::from_secs(1));
/// ```
///
/// ## Advancing time automatically
///
/// When exact instants don't matter, [`auto_advance_timers`][Self::auto_advance_timers]
/// jumps the clock to each upcoming timer deadline as soon as the timer is
/// registered, so delays resolve without any explicit `advance` calls.
#[derive(Debug, Clone, Default)]
pub struct ClockControl {
    /// The flow of time is shared across every clone of the control and every
    /// clock derived from it, so the state lives behind a mutex.
    state: Arc<Mutex<State>>,
}

impl ClockControl {
    /// Creates a new control with time frozen at the moment of creation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
        }
    }

    /// Converts the control into a [`Clock`] sharing this control's time.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock::with_control(self)
    }

    /// Determines whether the clock automatically jumps to each upcoming timer.
    ///
    /// When enabled, registering a timer (or advancing past one) immediately
    /// advances the clock to the next pending deadline, repeatedly, until no
    /// timers remain. Use this in tests that only care about delays resolving,
    /// not about the exact instants at which they do.
    #[must_use]
    pub fn auto_advance_timers(self, enabled: bool) -> Self {
        self.with_state(|s| s.auto_advance_timers = enabled);
        self
    }

    /// Manually advances the clock by the specified number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Manually advances the clock by the specified duration.
    ///
    /// In addition to moving the current instant forward, this fires every
    /// timer whose deadline falls within the advanced window.
    pub fn advance(&self, duration: Duration) {
        self.with_state(|s| s.advance(duration));
    }

    /// Returns the number of timers currently registered.
    ///
    /// Useful for asserting that cancelled delays did not leak their timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.with_state(|s| s.timers.len())
    }

    pub(crate) fn instant(&self) -> Instant {
        self.with_state(|s| s.instant)
    }

    pub(crate) fn register_timer(&self, when: Instant, waker: Waker) -> TimerKey {
        self.with_state(|s| {
            let key = s.timers.register(when, waker);
            s.evaluate_timers();
            key
        })
    }

    pub(crate) fn refresh_timer(&self, key: TimerKey, waker: &Waker) {
        self.with_state(|s| s.timers.refresh(key, waker));
    }

    pub(crate) fn unregister_timer(&self, key: TimerKey) {
        self.with_state(|s| s.timers.unregister(key));
    }

    fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut State) -> R,
    {
        f(&mut self.state.lock().expect("acquiring the clock lock must always succeed"))
    }
}

impl From<ClockControl> for Clock {
    fn from(control: ClockControl) -> Self {
        control.to_clock()
    }
}

impl From<&ClockControl> for Clock {
    fn from(control: &ClockControl) -> Self {
        control.to_clock()
    }
}

#[derive(Debug)]
struct State {
    instant: Instant,
    timers: Timers,
    auto_advance_timers: bool,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn new() -> Self {
        Self {
            instant: Instant::now(),
            timers: Timers::default(),
            auto_advance_timers: false,
        }
    }

    fn advance(&mut self, duration: Duration) {
        self.instant = self
            .instant
            .checked_add(duration)
            .expect("moving the clock outside of the supported instant range is not possible");
        self.timers.advance_timers(self.instant);
        self.evaluate_timers();
    }

    fn evaluate_timers(&mut self) {
        self.timers.advance_timers(self.instant);

        if !self.auto_advance_timers {
            return;
        }

        // Jump to each remaining deadline in order. The loop terminates because
        // every iteration removes at least the timer it jumped to.
        while let Some(next_timer) = self.timers.next_timer() {
            let to_next = next_timer.saturating_duration_since(self.instant);
            self.instant = self
                .instant
                .checked_add(to_next)
                .expect("moving the clock outside of the supported instant range is not possible");
            self.timers.advance_timers(self.instant);
        }
    }
}
