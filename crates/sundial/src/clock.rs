// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use crate::clock_control::ClockControl;
use crate::{Delay, Stopwatch};

/// An abstraction over the flow of monotonic time.
///
/// The clock is the single point through which time-sensitive code reads the
/// current instant and waits. In production the clock is a near-zero-overhead
/// wrapper over the system timer; in tests it is backed by a [`ClockControl`]
/// that advances only by explicit command, which makes time-dependent logic
/// fast to exercise and deterministic to assert on.
///
/// The clock is a cheap-clone handle: clones share the same flow of time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sundial::Clock;
///
/// async fn wait_a_little(clock: &Clock) {
///     let watch = clock.stopwatch();
///     clock.delay(Duration::from_millis(10)).await;
///     assert!(watch.elapsed() >= Duration::from_millis(10));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Clock(ClockRepr);

#[derive(Debug, Clone)]
enum ClockRepr {
    System,
    Controlled(ClockControl),
}

impl Clock {
    /// Creates a clock backed by the system timer.
    ///
    /// Delays created from a system clock are scheduled on the runtime's timer
    /// and must be awaited within a runtime with time enabled.
    #[must_use]
    pub fn system() -> Self {
        Self(ClockRepr::System)
    }

    pub(crate) fn with_control(control: &ClockControl) -> Self {
        Self(ClockRepr::Controlled(control.clone()))
    }

    /// Retrieves the current monotonic [`Instant`].
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.0 {
            ClockRepr::System => Instant::now(),
            ClockRepr::Controlled(control) => control.instant(),
        }
    }

    /// Creates a [`Delay`] that completes after the specified duration.
    ///
    /// A delay of [`Duration::ZERO`] completes immediately; a delay of
    /// [`Duration::MAX`] never completes. Dropping the delay cancels it and
    /// releases its timer.
    #[must_use]
    pub fn delay(&self, duration: Duration) -> Delay {
        match &self.0 {
            ClockRepr::System => Delay::system(duration),
            ClockRepr::Controlled(control) => Delay::controlled(control.clone(), duration),
        }
    }

    /// Creates a [`Stopwatch`] measuring elapsed time against this clock.
    #[must_use]
    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch::new(self)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl AsRef<Self> for Clock {
    fn as_ref(&self) -> &Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Clock: Send, Sync, Clone);
    }

    #[test]
    fn system_instant_moves_forward() {
        let clock = Clock::system();
        let first = clock.instant();
        let second = clock.instant();

        assert!(second >= first);
    }

    #[test]
    fn controlled_instant_is_frozen() {
        let control = ClockControl::new();
        let clock = control.to_clock();

        assert_eq!(clock.instant(), clock.instant());

        control.advance(Duration::from_secs(5));
        let first = clock.instant();
        let second = clock.instant();

        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn system_delay_completes() {
        let clock = Clock::system();
        let watch = clock.stopwatch();

        clock.delay(Duration::from_millis(5)).await;

        assert!(watch.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn default_is_system() {
        let clock = Clock::default();
        assert!(matches!(clock.0, ClockRepr::System));
    }
}
