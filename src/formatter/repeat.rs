// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fan-out [`Repeat`] combinator.

use std::sync::Arc;

use crate::{
    error::Failure,
    feature::Feature,
    formatter::Formatter,
    pickle::{Pickle, PickleStep},
    step::{AmbiguousMatch, Definition},
    storage::Storage,
};

/// Drives several formatters as one, forwarding every callback to each in
/// registration order. Supports concurrency only when every inner
/// formatter does.
#[derive(Default)]
pub struct Repeat {
    inner: Vec<Box<dyn Formatter + Send>>,
}

impl Repeat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, formatter: Box<dyn Formatter + Send>) -> Self {
        self.inner.push(formatter);
        self
    }
}

impl Formatter for Repeat {
    fn test_run_started(&mut self) {
        for f in &mut self.inner {
            f.test_run_started();
        }
    }

    fn feature(&mut self, feature: &Feature) {
        for f in &mut self.inner {
            f.feature(feature);
        }
    }

    fn pickle(&mut self, pickle: &Pickle) {
        for f in &mut self.inner {
            f.pickle(pickle);
        }
    }

    fn defined(&mut self, pickle: &Pickle, step: &PickleStep, definition: Option<&Definition>) {
        for f in &mut self.inner {
            f.defined(pickle, step, definition);
        }
    }

    fn passed(&mut self, pickle: &Pickle, step: &PickleStep) {
        for f in &mut self.inner {
            f.passed(pickle, step);
        }
    }

    fn skipped(&mut self, pickle: &Pickle, step: &PickleStep) {
        for f in &mut self.inner {
            f.skipped(pickle, step);
        }
    }

    fn undefined(&mut self, pickle: &Pickle, step: &PickleStep) {
        for f in &mut self.inner {
            f.undefined(pickle, step);
        }
    }

    fn pending(&mut self, pickle: &Pickle, step: &PickleStep) {
        for f in &mut self.inner {
            f.pending(pickle, step);
        }
    }

    fn failed(&mut self, pickle: &Pickle, step: &PickleStep, failure: &Failure) {
        for f in &mut self.inner {
            f.failed(pickle, step, failure);
        }
    }

    fn ambiguous(&mut self, pickle: &Pickle, step: &PickleStep, error: &AmbiguousMatch) {
        for f in &mut self.inner {
            f.ambiguous(pickle, step, error);
        }
    }

    fn summary(&mut self) {
        for f in &mut self.inner {
            f.summary();
        }
    }

    fn set_storage(&mut self, storage: Arc<Storage>) {
        for f in &mut self.inner {
            f.set_storage(Arc::clone(&storage));
        }
    }

    fn supports_concurrency(&self) -> bool {
        self.inner.iter().all(|f| f.supports_concurrency())
    }
}
