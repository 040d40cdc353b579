// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Pluggable reporting.
//!
//! One [`Formatter`] is active per run (fan out with [`Repeat`] to drive
//! several). Callbacks arrive in strict causal order per pickle:
//! `test_run_started` once, `feature` per document, then per pickle:
//! `pickle`, and per step `defined` followed by exactly one status
//! callback; finally `summary` once. A single pickle's callbacks never
//! interleave with themselves; pickles of a concurrent run may interleave
//! with each other, which is why formatters declare
//! [`supports_concurrency`](Formatter::supports_concurrency).

pub mod progress;

mod discard;
mod repeat;

use std::{io, sync::Arc};

use linked_hash_map::LinkedHashMap;

use crate::{
    error::{Error, Failure},
    feature::Feature,
    pickle::{Pickle, PickleStep},
    step::{AmbiguousMatch, Definition},
    storage::Storage,
};

#[doc(inline)]
pub use self::{discard::Discard, progress::Progress, repeat::Repeat};

/// Sink a formatter writes to.
pub type Output = Box<dyn io::Write + Send>;

/// Per-run reporting callbacks.
///
/// All callbacks default to no-ops, so a formatter only implements what it
/// renders.
pub trait Formatter {
    /// Run starts; called once before anything else.
    fn test_run_started(&mut self) {}

    /// A feature document entered the run.
    fn feature(&mut self, feature: &Feature) {
        let _ = feature;
    }

    /// A pickle's reporting block starts.
    fn pickle(&mut self, pickle: &Pickle) {
        let _ = pickle;
    }

    /// Step resolution result, before its status callback. `definition` is
    /// `None` for undefined and ambiguous steps.
    fn defined(&mut self, pickle: &Pickle, step: &PickleStep, definition: Option<&Definition>) {
        let _ = (pickle, step, definition);
    }

    fn passed(&mut self, pickle: &Pickle, step: &PickleStep) {
        let _ = (pickle, step);
    }

    fn skipped(&mut self, pickle: &Pickle, step: &PickleStep) {
        let _ = (pickle, step);
    }

    fn undefined(&mut self, pickle: &Pickle, step: &PickleStep) {
        let _ = (pickle, step);
    }

    fn pending(&mut self, pickle: &Pickle, step: &PickleStep) {
        let _ = (pickle, step);
    }

    fn failed(&mut self, pickle: &Pickle, step: &PickleStep, failure: &Failure) {
        let _ = (pickle, step, failure);
    }

    fn ambiguous(&mut self, pickle: &Pickle, step: &PickleStep, error: &AmbiguousMatch) {
        let _ = (pickle, step, error);
    }

    /// Run finished; called once after the last pickle.
    fn summary(&mut self) {}

    /// Hands the formatter the run's [`Storage`] for post-hoc queries
    /// during [`summary`](Formatter::summary).
    fn set_storage(&mut self, storage: Arc<Storage>) {
        let _ = storage;
    }

    /// Whether this formatter tolerates interleaved pickle blocks. The
    /// scheduler refuses to run a non-supporting formatter at concurrency
    /// above one, before execution starts rather than as a race discovered
    /// mid-run.
    fn supports_concurrency(&self) -> bool {
        false
    }
}

/// Formatter construction parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    /// Disables terminal styling.
    pub no_colors: bool,
}

type Factory = Box<dyn Fn(Output, Config) -> Box<dyn Formatter + Send> + Send + Sync>;

/// Explicit name→factory table of available formatters. Owned by the
/// suite; nothing global.
#[derive(Default)]
pub struct Registry {
    factories: LinkedHashMap<String, Factory>,
}

impl Registry {
    /// Empty registry, without even the built-in formatters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in formatters: `progress` and `discard`.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register("progress", |out, config| {
                Box::new(Progress::new(out, config.no_colors))
            })
            .register("discard", |_, _| Box::new(Discard));
        registry
    }

    /// Registers (or replaces) a formatter factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Output, Config) -> Box<dyn Formatter + Send> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Instantiates the formatter registered under `name`.
    pub(crate) fn create(
        &self,
        name: &str,
        out: Output,
        config: Config,
    ) -> Result<Box<dyn Formatter + Send>, Error> {
        self.factories
            .get(name)
            .map(|factory| factory(out, config))
            .ok_or_else(|| Error::UnknownFormat(name.to_owned()))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
