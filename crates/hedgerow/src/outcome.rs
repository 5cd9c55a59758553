// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};

/// The boxed error type carried by a failed [`Outcome`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The result of one execution of the user operation.
///
/// `Outcome` is the unit of exchange between the user callback and the hedging
/// controller: the callback produces one, the validator judges it, and the
/// accepted one is returned to the caller verbatim. A failure carries a boxed
/// error so operations with different error types can flow through the same
/// machinery; captured panics travel the same way as an
/// [`Error`][crate::Error] failure.
///
/// # Examples
///
/// ```
/// use hedgerow::Outcome;
///
/// let ok: Outcome<u32> = Outcome::Success(7);
/// assert!(ok.is_success());
///
/// let err: Outcome<u32> = Outcome::failure(std::io::Error::other("connection reset"));
/// assert!(err.is_failure());
/// ```
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation produced a value.
    Success(T),

    /// The operation failed with the carried error.
    Failure(BoxError),
}

impl<T> Outcome<T> {
    /// Creates a failed outcome from any boxable error.
    pub fn failure(error: impl Into<BoxError>) -> Self {
        Self::Failure(error.into())
    }

    /// Returns `true` when the outcome carries a value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns `true` when the outcome carries an error.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the carried value, if any.
    #[must_use]
    pub const fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns the carried error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error.as_ref()),
        }
    }

    /// Converts the outcome into a standard [`Result`].
    ///
    /// # Errors
    ///
    /// Returns the carried error when the outcome is a failure.
    pub fn into_result(self) -> Result<T, BoxError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }
}

impl<T, E: Into<BoxError>> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error.into()),
        }
    }
}

/// The validator's judgement of one [`Outcome`].
///
/// The first completed attempt whose outcome is judged [`Verdict::Accept`]
/// wins the hedged execution; a rejected outcome is abandoned and the
/// controller keeps hedging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The outcome is acceptable; commit it and stop hedging.
    Accept,

    /// The outcome is not acceptable; keep waiting or hedge further.
    Reject,
}

impl Verdict {
    /// Returns `true` for [`Verdict::Accept`].
    #[must_use]
    pub const fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Reject => write!(f, "reject"),
        }
    }
}
