// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Immutable scenario [`Context`] threaded through hooks and steps.

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Immutable key/value chain handed to every hook and step of a scenario.
///
/// Cloning is cheap (an [`Arc`] bump), and inserting never mutates the
/// receiver: [`Context::with`] returns a new value whose entry shadows any
/// older one under the same key. Steps that want to pass state forward
/// return the extended [`Context`]; steps that return nothing leave the
/// chain untouched for the next step.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
    cancel: CancelToken,
}

struct Node {
    key: String,
    value: Arc<dyn Any + Send + Sync>,
    next: Option<Arc<Node>>,
}

impl Context {
    /// Creates an empty [`Context`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new [`Context`] carrying `value` under `key`, shadowing any
    /// previous entry with the same key.
    #[must_use]
    pub fn with<T>(&self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Node {
                key: key.into(),
                value: Arc::new(value),
                next: self.head.clone(),
            })),
            cancel: self.cancel.clone(),
        }
    }

    /// Looks up the newest entry under `key`, downcast to `T`.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return n.value.downcast_ref::<T>();
            }
            node = n.next.as_deref();
        }
        None
    }

    /// Indicates whether `key` is present, regardless of its value's type.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return true;
            }
            node = n.next.as_deref();
        }
        false
    }

    /// Returns a new [`Context`] observing the given [`CancelToken`].
    #[must_use]
    pub fn with_cancellation(&self, cancel: CancelToken) -> Self {
        Self {
            head: self.head.clone(),
            cancel,
        }
    }

    /// Indicates whether the run this [`Context`] belongs to was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            keys.push(n.key.as_str());
            node = n.next.as_deref();
        }
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cooperative cancellation flag shared between a [`Context`] and whoever
/// drives the run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the token. Long-running steps observing it via
    /// [`Context::is_cancelled()`] are expected to bail out.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
