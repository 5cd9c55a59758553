// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Injectable monotonic time for asynchronous code.
//!
//! Working with time is notoriously difficult to test. This crate provides a
//! [`Clock`] handle that production code uses exactly like the system timer,
//! while tests swap in a [`ClockControl`] virtual clock that advances only by
//! explicit command.
//!
//! - [`Clock`]: retrieves the current monotonic [`Instant`][std::time::Instant]
//!   and creates cancellable [`Delay`]s.
//! - [`Delay`]: a future that completes after a duration. Cancelling a delay is
//!   dropping it; a dropped virtual delay unregisters its timer.
//! - [`ClockControl`]: controls the flow of virtual time in tests.
//! - [`Stopwatch`]: measures elapsed time against a clock.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use sundial::{Clock, ClockControl};
//!
//! let control = ClockControl::new();
//! let clock = control.to_clock();
//!
//! let watch = clock.stopwatch();
//! control.advance(Duration::from_millis(250));
//!
//! assert_eq!(watch.elapsed(), Duration::from_millis(250));
//! ```
//!
//! The system-backed clock is created with [`Clock::system`] and delegates
//! delays to the runtime's timer. Code that takes a `Clock` never needs to
//! know which kind it was handed.

mod clock;
mod clock_control;
mod delay;
mod stopwatch;
mod timers;

pub use clock::*;
pub use clock_control::*;
pub use delay::*;
pub use stopwatch::*;
pub(crate) use timers::{TimerKey, Timers};
