// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

/// An error produced by the hedging machinery itself.
///
/// User failures flow through [`Outcome::Failure`][crate::Outcome::Failure]
/// untouched; this type covers the two conditions the core has to surface on
/// its own: the caller cancelled the whole hedged execution, or an attempt's
/// user callback panicked and the panic was materialized into a failure.
///
/// # Limited introspection
///
/// Other than the [`is_cancelled`][Error::is_cancelled] and
/// [`is_attempt_panic`][Error::is_attempt_panic] predicates and the standard
/// error traits, this type provides no introspection capabilities.
///
/// # Examples
///
/// ```
/// use hedgerow::{Error, Outcome};
///
/// fn was_cancelled(outcome: &Outcome<u32>) -> bool {
///     outcome
///         .error()
///         .and_then(|e| e.downcast_ref::<Error>())
///         .is_some_and(Error::is_cancelled)
/// }
/// ```
#[derive(Debug)]
pub struct Error(ErrorKind);

#[derive(Debug)]
enum ErrorKind {
    Cancelled,
    AttemptPanic(Cow<'static, str>),
}

impl Error {
    pub(crate) const fn cancelled() -> Self {
        Self(ErrorKind::Cancelled)
    }

    pub(crate) fn attempt_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            Cow::Borrowed(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Cow::Owned(message.clone())
        } else {
            Cow::Borrowed("opaque panic payload")
        };

        Self(ErrorKind::AttemptPanic(message))
    }

    /// Returns `true` when the hedged execution was cancelled by the caller.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.0, ErrorKind::Cancelled)
    }

    /// Returns `true` when an attempt's callback panicked.
    #[must_use]
    pub const fn is_attempt_panic(&self) -> bool {
        matches!(self.0, ErrorKind::AttemptPanic(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorKind::Cancelled => write!(f, "hedged execution was cancelled"),
            ErrorKind::AttemptPanic(message) => write!(f, "attempt panicked: {message}"),
        }
    }
}

impl std::error::Error for Error {}
