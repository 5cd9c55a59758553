// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::clock_control::ClockControl;
use crate::timers::TimerKey;

/// Asynchronously waits for the specified duration.
///
/// Created through [`Clock::delay`][crate::Clock::delay]. The delay completes
/// once the clock has moved past its deadline. Cancelling a delay is simply
/// dropping it; a dropped delay releases its timer registration, so racing a
/// delay against another future and discarding the loser leaves nothing
/// behind. Dropping a delay that already fired is a no-op.
///
/// # Precision
///
/// The delay is scheduled cooperatively; under load it may complete later
/// than requested, never earlier.
#[derive(Debug)]
pub struct Delay(DelayRepr);

#[derive(Debug)]
enum DelayRepr {
    // Boxed because tokio's sleep must be pinned and the delay itself stays Unpin.
    System(Pin<Box<tokio::time::Sleep>>),
    Controlled(ControlledDelay),
}

impl Delay {
    pub(crate) fn system(duration: Duration) -> Self {
        let deadline = tokio::time::Instant::now().checked_add(duration).unwrap_or_else(|| {
            // Roughly 30 years from now; mirrors tokio's private `Instant::far_future`.
            tokio::time::Instant::now() + Duration::from_secs(86400 * 365 * 30)
        });

        Self(DelayRepr::System(Box::pin(tokio::time::sleep_until(deadline))))
    }

    pub(crate) fn controlled(control: ClockControl, duration: Duration) -> Self {
        Self(DelayRepr::Controlled(ControlledDelay {
            control,
            duration,
            timer: None,
        }))
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().0 {
            DelayRepr::System(sleep) => sleep.as_mut().poll(cx),
            DelayRepr::Controlled(delay) => delay.poll(cx),
        }
    }
}

/// Delay driven by a [`ClockControl`]. The timer is registered lazily on the
/// first poll and unregistered on completion or drop.
#[derive(Debug)]
struct ControlledDelay {
    control: ClockControl,
    duration: Duration,
    timer: Option<TimerKey>,
}

impl ControlledDelay {
    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match self.timer {
            None if self.duration == Duration::ZERO => Poll::Ready(()),
            None if self.duration == Duration::MAX => Poll::Pending,
            None => {
                let Some(when) = self.control.instant().checked_add(self.duration) else {
                    // Past the maximum representable instant; never finishes.
                    self.duration = Duration::MAX;
                    return Poll::Pending;
                };

                // Registration can fire the timer synchronously when the clock
                // auto-advances, so re-check the deadline right away.
                let key = self.control.register_timer(when, cx.waker().clone());
                if when <= self.control.instant() {
                    self.timer = None;
                    self.control.unregister_timer(key);
                    return Poll::Ready(());
                }

                self.timer = Some(key);
                Poll::Pending
            }
            Some(key) if key.tick() <= self.control.instant() => {
                self.timer = None;

                // Unregister in case this poll was not driven by the timer firing.
                self.control.unregister_timer(key);

                Poll::Ready(())
            }
            Some(key) => {
                // The future may have moved to a different task since the
                // timer was registered; keep the stored waker current.
                self.control.refresh_timer(key, cx.waker());
                Poll::Pending
            }
        }
    }
}

impl Drop for ControlledDelay {
    fn drop(&mut self) {
        if let Some(key) = self.timer.take() {
            self.control.unregister_timer(key);
        }
    }
}
