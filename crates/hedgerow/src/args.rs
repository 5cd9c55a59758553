// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Attempt, ResilienceContext};

/// Arguments passed to the action generator for each prospective hedge.
///
/// The generator inspects the attempt tag (and the caller's context) and
/// either produces the callback to run for this hedge or declines, which
/// stops any further hedges from launching.
#[derive(Debug)]
pub struct ActionArgs<'a> {
    pub(crate) attempt: Attempt,
    pub(crate) context: &'a ResilienceContext,
}

impl ActionArgs<'_> {
    /// Returns the tag of the attempt about to launch.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Returns the caller's resilience context.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        self.context
    }
}

/// Arguments passed to the on-hedging observer when a hedge is launched.
#[derive(Debug)]
pub struct OnHedgingArgs {
    pub(crate) attempt: Attempt,
}

impl OnHedgingArgs {
    /// Returns the tag of the hedge that was just launched.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }
}

/// Arguments passed to a [`HedgingMode::dynamic`][crate::HedgingMode::dynamic]
/// delay callback.
#[derive(Debug)]
pub struct HedgingDelayArgs {
    pub(crate) attempt: Attempt,
}

impl HedgingDelayArgs {
    /// Returns the tag of the attempt the delay applies to.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_args_accessors() {
        let context = ResilienceContext::new();
        let args = ActionArgs {
            attempt: Attempt::hedge(2, true),
            context: &context,
        };

        assert_eq!(args.attempt().index(), 2);
        assert!(args.context().attempt().is_primary());
    }

    #[test]
    fn on_hedging_args_accessors() {
        let args = OnHedgingArgs {
            attempt: Attempt::hedge(1, false),
        };

        assert_eq!(args.attempt().index(), 1);
        assert!(!args.attempt().is_last());
    }

    #[test]
    fn hedging_delay_args_accessors() {
        let args = HedgingDelayArgs {
            attempt: Attempt::hedge(3, true),
        };

        assert_eq!(args.attempt().index(), 3);
    }
}
