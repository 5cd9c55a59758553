// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::mem;
use std::task::Waker;
use std::time::{Duration, Instant};

/// Unique identifier for a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerKey {
    tick: Instant,

    /// Discriminator that allows two timers registered for the same instant.
    discriminator: u32,
}

impl TimerKey {
    const fn new(tick: Instant, discriminator: u32) -> Self {
        Self { tick, discriminator }
    }

    /// Determines when the timer will fire.
    pub const fn tick(&self) -> Instant {
        self.tick
    }
}

/// Management of one-shot timers for the controlled clock.
///
/// Timers are stored in the order in which they will fire. The [`Waker`]
/// represents the task awaiting the timer. A timer never fires twice.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    wakers: BTreeMap<TimerKey, Waker>,
    last_discriminator: u32,
}

impl Timers {
    pub fn len(&self) -> usize {
        self.wakers.len()
    }

    /// Registers a new timer that will fire at the specified instant.
    pub fn register(&mut self, when: Instant, waker: Waker) -> TimerKey {
        // Wrapping is fine; the discriminator only disambiguates equal instants.
        self.last_discriminator = self.last_discriminator.wrapping_add(1);
        let key = TimerKey::new(when, self.last_discriminator);

        self.wakers.insert(key, waker);

        key
    }

    /// Replaces the waker of a pending timer.
    ///
    /// No-op when the timer already fired or was unregistered.
    pub fn refresh(&mut self, key: TimerKey, waker: &Waker) {
        if let Some(slot) = self.wakers.get_mut(&key) {
            slot.clone_from(waker);
        }
    }

    /// Unregisters a timer. No-op when the timer is not present.
    pub fn unregister(&mut self, key: TimerKey) {
        self.wakers.remove(&key);
    }

    /// Returns the instant when the next timer fires, or `None` when no timers
    /// are registered.
    pub fn next_timer(&self) -> Option<Instant> {
        self.wakers.keys().next().map(TimerKey::tick)
    }

    /// Wakes every timer whose deadline is at or before `now`.
    pub fn advance_timers(&mut self, now: Instant) {
        // One nanosecond past `now` so timers whose deadline equals the current
        // instant are included; `split_off` excludes keys equal to the split key.
        let adjusted_now = now.checked_add(Duration::from_nanos(1)).unwrap_or(now);

        if self.next_timer().is_none_or(|next| next > adjusted_now) {
            return;
        }

        let pending = self.wakers.split_off(&TimerKey::new(adjusted_now, 0));
        let ready = mem::replace(&mut self.wakers, pending);

        for (_, waker) in ready {
            waker.wake();
        }
    }

    #[cfg(test)]
    fn contains(&self, key: TimerKey) -> bool {
        self.wakers.contains_key(&key)
    }
}
