// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Hedged execution: speculative parallel attempts that trade work for tail
//! latency.
//!
//! Given one logical asynchronous operation, [`execute`] launches the
//! *primary* attempt and, governed by a [`HedgingMode`], up to N-1
//! speculative *hedges* of it in parallel. The first completed attempt whose
//! [`Outcome`] the validator accepts wins; everything else is cancelled and
//! discarded. Hedging is the classic answer to long-tail latency: when a
//! replica is slow, a second request to another replica usually isn't.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use hedgerow::{AttemptPool, HedgingMode, HedgingOptions, Outcome, ResilienceContext, Verdict, execute};
//! use sundial::Clock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Accept successes, keep hedging past failures.
//! let options = HedgingOptions::new(|outcome: &Outcome<String>| {
//!     if outcome.is_success() { Verdict::Accept } else { Verdict::Reject }
//! })
//! .max_attempts(3)
//! .mode(HedgingMode::after_delay(Duration::from_millis(100)));
//!
//! // The pool is the only cross-invocation structure; share one per service.
//! let pool = AttemptPool::new();
//! let clock = Clock::system();
//! let context = ResilienceContext::new();
//!
//! let outcome = execute(
//!     &context,
//!     |context, region: String| async move {
//!         // Attempt 0 is the primary; hedges observe their own index.
//!         let _attempt = context.attempt();
//!         Outcome::Success(format!("queried {region}"))
//!     },
//!     "eu-west".to_string(),
//!     &options,
//!     &clock,
//!     &pool,
//! )
//! .await;
//!
//! assert!(outcome.is_success());
//! # }
//! ```
//!
//! # How It Works
//!
//! - **[`HedgingMode::parallel`]**: every attempt launches at once.
//! - **[`HedgingMode::after_delay`]**: each hedge launches once a fixed delay
//!   elapses without an acceptable completion; a rejected completion launches
//!   the next hedge immediately.
//! - **[`HedgingMode::serial`]**: no speculation; the next attempt launches
//!   only after one completes rejected.
//! - **[`HedgingMode::dynamic`]**: the delay is computed per attempt.
//!
//! Every attempt runs in its own spawned task under its own
//! [`ResilienceContext`]: a cancellation token linked to the caller's, a copy
//! of the caller's properties, and an [`Attempt`] tag. Losing attempts are
//! cancelled through their tokens and awaited to quiescence before their
//! slots return to the [`AttemptPool`]; the winner's properties are merged
//! back into the caller's context.
//!
//! # Never-failing attempts
//!
//! A user callback cannot break the controller: errors are values
//! ([`Outcome::Failure`]) and panics are caught and materialized into
//! failures carrying an [`Error`], so they flow through the validator like
//! any other outcome.
//!
//! # Time
//!
//! All timing goes through a [`sundial::Clock`], so the hedging delay logic
//! runs against virtual time in tests; see the `ClockControl`-driven
//! scenarios in this crate's integration tests.
//!
//! # Scope
//!
//! This crate is the execution core only. Timeouts, retries, circuit
//! breaking, metrics, and configuration surfaces belong to outer layers;
//! they feed the core a callback, a validator, and a clock.

mod args;
mod attempt;
mod callbacks;
mod context;
mod controller;
mod error;
mod execution;
mod mode;
mod options;
mod outcome;
mod pool;

pub use args::{ActionArgs, HedgingDelayArgs, OnHedgingArgs};
pub use attempt::{Attempt, AttemptKind};
pub use callbacks::HedgeCallback;
pub use context::{Properties, ResilienceContext};
pub use controller::execute;
pub use error::Error;
pub use mode::HedgingMode;
pub use options::HedgingOptions;
pub use outcome::{BoxError, Outcome, Verdict};
pub use pool::AttemptPool;
