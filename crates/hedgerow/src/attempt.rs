// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// Distinguishes the original attempt from its speculative hedges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// The original attempt, launched first and never declined.
    Primary,

    /// A speculative hedge launched after (or alongside) the primary.
    Hedge,
}

/// Identifies a single attempt within one hedged execution.
///
/// The attempt tag travels on the per-attempt
/// [`ResilienceContext`][crate::ResilienceContext] so user code can observe
/// which attempt it is running as.
///
/// # Examples
///
/// ```
/// use hedgerow::ResilienceContext;
///
/// fn endpoint_for(context: &ResilienceContext) -> &'static str {
///     // Route hedges to a different replica than the primary.
///     if context.attempt().is_primary() { "replica-a" } else { "replica-b" }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    kind: AttemptKind,
    index: u32,
    is_last: bool,
}

impl Default for Attempt {
    /// The default attempt is a single-shot primary: index 0, first and last.
    fn default() -> Self {
        Self::first(true)
    }
}

impl Attempt {
    pub(crate) const fn first(is_last: bool) -> Self {
        Self {
            kind: AttemptKind::Primary,
            index: 0,
            is_last,
        }
    }

    pub(crate) const fn hedge(index: u32, is_last: bool) -> Self {
        Self {
            kind: AttemptKind::Hedge,
            index,
            is_last,
        }
    }

    /// Returns the kind of this attempt.
    #[must_use]
    pub const fn kind(self) -> AttemptKind {
        self.kind
    }

    /// Returns the 0-based attempt index.
    ///
    /// Index 0 is the primary; hedges count up from 1 in launch order.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns `true` when this is the primary attempt.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self.kind, AttemptKind::Primary)
    }

    /// Returns `true` when no further attempt can launch after this one.
    #[must_use]
    pub const fn is_last(self) -> bool {
        self.is_last
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.index.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_is_primary() {
        let attempt = Attempt::first(false);

        assert_eq!(attempt.kind(), AttemptKind::Primary);
        assert_eq!(attempt.index(), 0);
        assert!(attempt.is_primary());
        assert!(!attempt.is_last());
    }

    #[test]
    fn hedge_counts_from_one() {
        let attempt = Attempt::hedge(2, true);

        assert_eq!(attempt.kind(), AttemptKind::Hedge);
        assert_eq!(attempt.index(), 2);
        assert!(!attempt.is_primary());
        assert!(attempt.is_last());
    }

    #[test]
    fn default_is_single_shot_primary() {
        let attempt = Attempt::default();

        assert!(attempt.is_primary());
        assert_eq!(attempt.index(), 0);
        assert!(attempt.is_last());
    }

    #[test]
    fn display_shows_index() {
        assert_eq!(format!("{}", Attempt::hedge(3, false)), "3");
    }
}
