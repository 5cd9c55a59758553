// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::args::{ActionArgs, HedgingDelayArgs, OnHedgingArgs};
use crate::{Outcome, ResilienceContext, Verdict};

/// A macro to generate `Fn`-like wrapper types with consistent patterns.
///
/// The generated type wraps a function in an `Arc<dyn Fn ...>`, providing
/// `Clone`, `Debug`, and a `new`/`call` pair. This is how user-provided
/// predicates and factories are stored in a thread-safe, clonable way.
macro_rules! define_fn_wrapper {
    ($name:ident$(<$($generics:ident),*>)?(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        pub(crate) struct $name$(<$($generics),*>)?(
            std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>,
        );

        impl$(<$($generics),*>)? $name$(<$($generics),*>)? {
            pub(crate) fn new<F>(callback: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(callback))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl$(<$($generics),*>)? Clone for $name$(<$($generics),*>)? {
            fn clone(&self) -> Self {
                Self(self.0.clone())
            }
        }

        impl$(<$($generics),*>)? std::fmt::Debug for $name$(<$($generics),*>)? {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };
}

define_fn_wrapper!(Validator<T>(Fn(outcome: &Outcome<T>) -> Verdict));
define_fn_wrapper!(ActionGenerator<T, S>(Fn(args: ActionArgs<'_>) -> Option<HedgeCallback<T, S>>));
define_fn_wrapper!(DelayFn(Fn(args: HedgingDelayArgs) -> std::time::Duration));

// The future-returning wrappers are defined manually because their
// constructors box the returned future.

/// The user operation executed by every attempt.
///
/// A `HedgeCallback` receives the attempt's isolated [`ResilienceContext`]
/// and a clone of the caller's state, and resolves to an [`Outcome`]. The
/// same callback normally serves every attempt; an action generator can
/// substitute a different one per hedge (for example to route hedges to a
/// secondary replica).
///
/// # Examples
///
/// ```
/// use hedgerow::{HedgeCallback, Outcome};
///
/// let callback: HedgeCallback<String, String> = HedgeCallback::new(|_context, name| async move {
///     Outcome::Success(format!("hello, {name}"))
/// });
/// ```
pub struct HedgeCallback<T, S>(
    Arc<dyn Fn(ResilienceContext, S) -> BoxFuture<'static, Outcome<T>> + Send + Sync>,
);

impl<T, S> HedgeCallback<T, S> {
    /// Wraps an asynchronous operation into a storable callback.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(ResilienceContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self(Arc::new(move |context, state| callback(context, state).boxed()))
    }

    pub(crate) fn call(&self, context: ResilienceContext, state: S) -> BoxFuture<'static, Outcome<T>> {
        (self.0)(context, state)
    }
}

impl<T, S> Clone for HedgeCallback<T, S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T, S> std::fmt::Debug for HedgeCallback<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgeCallback").finish()
    }
}

pub(crate) struct OnHedging(Arc<dyn Fn(OnHedgingArgs) -> BoxFuture<'static, ()> + Send + Sync>);

impl OnHedging {
    pub(crate) fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(OnHedgingArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(move |args| hook(args).boxed()))
    }

    pub(crate) fn call(&self, args: OnHedgingArgs) -> BoxFuture<'static, ()> {
        (self.0)(args)
    }
}

impl Clone for OnHedging {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl std::fmt::Debug for OnHedging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnHedging").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use super::*;
    use crate::Attempt;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(HedgeCallback<String, u32>: Send, Sync, Clone, Debug);
        static_assertions::assert_impl_all!(Validator<String>: Send, Sync, Clone, Debug);
        static_assertions::assert_impl_all!(OnHedging: Send, Sync, Clone, Debug);
    }

    #[test]
    fn validator_call_ok() {
        let validator: Validator<u32> = Validator::new(|outcome| {
            if outcome.is_success() {
                Verdict::Accept
            } else {
                Verdict::Reject
            }
        });

        assert_eq!(validator.call(&Outcome::Success(1)), Verdict::Accept);
        assert_eq!(validator.call(&Outcome::failure(std::io::Error::other("x"))), Verdict::Reject);
    }

    #[test]
    fn generator_can_decline() {
        let generator: ActionGenerator<u32, ()> =
            ActionGenerator::new(|args| (args.attempt().index() < 2).then(|| HedgeCallback::new(|_, ()| async { Outcome::Success(0) })));

        let context = ResilienceContext::new();
        let accepted = generator.call(ActionArgs {
            attempt: Attempt::hedge(1, false),
            context: &context,
        });
        let declined = generator.call(ActionArgs {
            attempt: Attempt::hedge(2, false),
            context: &context,
        });

        assert!(accepted.is_some());
        assert!(declined.is_none());
    }

    #[tokio::test]
    async fn hedge_callback_call_ok() {
        let callback: HedgeCallback<u32, u32> =
            HedgeCallback::new(|_context, state| async move { Outcome::Success(state * 2) });

        let outcome = callback.call(ResilienceContext::new(), 21).await;

        assert_eq!(outcome.success(), Some(&42));
    }

    #[test]
    fn debug_is_opaque() {
        let callback: HedgeCallback<u32, ()> = HedgeCallback::new(|_, ()| async { Outcome::Success(0) });
        assert_eq!(format!("{callback:?}"), "HedgeCallback");

        let validator: Validator<u32> = Validator::new(|_| Verdict::Accept);
        assert_eq!(format!("{validator:?}"), "Validator");
    }
}
