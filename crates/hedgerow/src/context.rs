// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::Attempt;

type PropertyValue = Arc<dyn Any + Send + Sync>;

/// A shared, typed key-value bag attached to a [`ResilienceContext`].
///
/// Cloning a `Properties` is shallow: clones read and write the same
/// underlying map. Values are stored type-erased; retrieval clones the value
/// out, so property types are expected to be cheap to clone (or wrapped in an
/// `Arc` by the caller).
///
/// # Examples
///
/// ```
/// use hedgerow::Properties;
///
/// let properties = Properties::default();
/// properties.insert("region", "eu-west".to_string());
///
/// assert_eq!(properties.get::<String>("region").as_deref(), Some("eu-west"));
/// assert_eq!(properties.get::<u32>("region"), None);
/// ```
#[derive(Clone, Default)]
pub struct Properties {
    entries: Arc<Mutex<HashMap<Cow<'static, str>, PropertyValue>>>,
}

impl Properties {
    /// Inserts a value under the key, replacing any previous value.
    pub fn insert<V: Any + Send + Sync>(&self, key: impl Into<Cow<'static, str>>, value: V) {
        self.entries.lock().insert(key.into(), Arc::new(value));
    }

    /// Retrieves a clone of the value stored under the key.
    ///
    /// Returns `None` when the key is absent or holds a value of a different
    /// type.
    #[must_use]
    pub fn get<V: Any + Send + Sync + Clone>(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key)?.downcast_ref::<V>().cloned()
    }

    /// Returns `true` when a value is stored under the key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Returns the number of stored properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when no properties are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Creates an independent bag seeded with the current entries.
    pub(crate) fn deep_copy(&self) -> Self {
        Self {
            entries: Arc::new(Mutex::new(self.entries.lock().clone())),
        }
    }

    /// Upserts every entry of `other` into this bag, replacing on key
    /// collision.
    pub(crate) fn merge_from(&self, other: &Self) {
        // Snapshot first so the two locks are never held at once.
        let snapshot: Vec<_> = other
            .entries
            .lock()
            .iter()
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect();

        let mut entries = self.entries.lock();
        for (key, value) in snapshot {
            entries.insert(key, value);
        }
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Properties").field("len", &self.len()).finish()
    }
}

/// The per-invocation capability bag handed to every attempt.
///
/// A resilience context carries a cancellation token, a writable
/// [`Properties`] map, and the [`Attempt`] tag identifying which attempt the
/// holder is running as. `Clone` is shallow: a clone shares the token state
/// and the property map of the original, which is how an attempt's stored
/// context observes writes made by the user callback.
///
/// Per-attempt contexts are produced internally by the controller: each one
/// gets a *child* of the caller's cancellation token (so cancelling one
/// attempt never affects its siblings or the caller) and a deep copy of the
/// caller's properties (so concurrent attempts never observe each other's
/// writes). On commit, the winning attempt's properties are merged back into
/// the caller's context.
///
/// # Examples
///
/// ```
/// use hedgerow::ResilienceContext;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let context = ResilienceContext::with_cancellation(token.clone());
/// context.properties().insert("tenant", 7u32);
///
/// // Cancelling the caller's token reaches everything derived from it.
/// token.cancel();
/// assert!(context.cancellation().is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResilienceContext {
    cancellation: CancellationToken,
    properties: Properties,
    attempt: Attempt,
}

impl ResilienceContext {
    /// Creates a context with a fresh root cancellation token and an empty
    /// property bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context governed by the given cancellation token.
    #[must_use]
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            properties: Properties::default(),
            attempt: Attempt::default(),
        }
    }

    /// Returns the cancellation token governing this context.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the property bag of this context.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the tag of the attempt this context belongs to.
    ///
    /// For the caller's own context this is the default single-shot primary
    /// tag; inside a user callback it identifies the running attempt.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Derives the isolated context for one attempt: a child token linked to
    /// this context's token, a deep copy of the properties, and the attempt
    /// tag.
    pub(crate) fn hedged_view(&self, attempt: Attempt) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            properties: self.properties.deep_copy(),
            attempt,
        }
    }
}
