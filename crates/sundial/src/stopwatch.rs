// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use crate::Clock;

/// A stopwatch that facilitates the measurement of elapsed time.
///
/// Created by [`Clock::stopwatch`] or by passing a [`Clock`] to
/// [`Stopwatch::new`]. Against a controlled clock the elapsed time reflects
/// only explicit advances, which makes assertions on virtual durations exact.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sundial::ClockControl;
///
/// let control = ClockControl::new();
/// let watch = control.to_clock().stopwatch();
///
/// control.advance(Duration::from_secs(1));
///
/// assert_eq!(watch.elapsed(), Duration::from_secs(1));
/// ```
#[derive(Debug)]
pub struct Stopwatch {
    clock: Clock,
    start: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch that starts measuring now.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            start: clock.instant(),
        }
    }

    /// Returns the elapsed time since the stopwatch was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.instant().saturating_duration_since(self.start)
    }
}

impl From<Stopwatch> for Duration {
    fn from(stopwatch: Stopwatch) -> Self {
        stopwatch.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClockControl;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Stopwatch: Send, Sync);
    }

    #[test]
    fn stopwatch_with_system_clock() {
        let clock = Clock::system();
        let watch = clock.stopwatch();

        std::thread::sleep(Duration::from_millis(1));

        assert!(watch.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn stopwatch_with_control() {
        let control = ClockControl::new();
        let watch = control.to_clock().stopwatch();

        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(watch.elapsed(), Duration::ZERO);

        control.advance(Duration::from_secs(1));
        assert_eq!(watch.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn stopwatch_into_duration() {
        let control = ClockControl::new();
        let watch = control.to_clock().stopwatch();
        control.advance(Duration::from_secs(2));

        let duration: Duration = watch.into();

        assert_eq!(duration, Duration::from_secs(2));
    }
}
