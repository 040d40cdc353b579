// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step definitions [`Registry`] and matching.

pub mod args;
pub mod error;
pub mod handler;
pub mod location;
pub mod pattern;
pub mod snippet;

use std::{fmt, sync::Arc};

use itertools::Itertools as _;

use crate::{Context, Value};

#[doc(inline)]
pub use self::{
    args::{BindError, ParamType},
    error::AmbiguousMatch,
    handler::{Handler, IntoOutcome, Outcome, StepParam},
    location::Location,
    pattern::{IntoPattern, Pattern},
};

/// A registered step definition: pattern, typed handler and registration
/// site. Built once at suite-initialization time and read-only afterwards.
pub struct Definition {
    pattern: Pattern,
    location: Location,
    params: Vec<ParamType>,
    handler: Box<dyn Fn(Context, Vec<Value>) -> Outcome + Send + Sync>,
}

impl Definition {
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    #[must_use]
    pub fn location(&self) -> Location {
        self.location
    }

    /// Parameter types the handler declares, excluding a leading
    /// [`Context`].
    #[must_use]
    pub fn param_types(&self) -> &[ParamType] {
        &self.params
    }

    pub(crate) fn call(&self, ctx: Context, values: Vec<Value>) -> Outcome {
        (self.handler)(ctx, values)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("pattern", &self.pattern)
            .field("location", &self.location)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Result of matching one step text against the whole [`Registry`].
#[derive(Debug)]
pub enum Match {
    /// No registered pattern matched.
    Undefined,

    /// Exactly one pattern matched.
    Single(StepMatch),

    /// Multiple patterns matched; carries every conflict.
    Ambiguous(AmbiguousMatch),
}

/// A unique match: the winning [`Definition`] plus its extracted capture
/// groups.
#[derive(Debug)]
pub struct StepMatch {
    pub definition: Arc<Definition>,
    pub captures: Vec<String>,
}

/// Ordered collection of step [`Definition`]s.
///
/// Registration order is preserved for listing purposes only; matching is
/// insensitive to it: a text matching exactly one pattern resolves to
/// that definition no matter when it was registered, and a text matching
/// several is always [`Match::Ambiguous`].
#[derive(Debug, Default)]
pub struct Registry {
    defs: Vec<Arc<Definition>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step definition.
    ///
    /// # Panics
    ///
    /// If `pattern` is not a valid regular expression, or the handler
    /// declares a doc string/table parameter anywhere but last. Both are
    /// wiring mistakes, caught before any scenario runs. A capture-count
    /// mismatch, in contrast, is only detectable per matched text and
    /// surfaces as a step failure at run time.
    #[track_caller]
    pub fn register<M, H>(&mut self, pattern: impl IntoPattern, handler: H) -> &mut Self
    where
        H: Handler<M>,
    {
        let location = Location::from_caller();
        let pattern = pattern.into_pattern();
        let params = H::param_types();
        if params
            .iter()
            .rev()
            .skip(1)
            .any(|p| p.is_structured())
        {
            panic!(
                "invalid step definition `{pattern}` at {location}: \
                 doc string and table parameters must be the last parameter",
            );
        }
        self.defs.push(Arc::new(Definition {
            pattern,
            location,
            params,
            handler: Box::new(move |ctx, values| handler.call(ctx, values)),
        }));
        self
    }

    /// Runs `text` against every registered pattern.
    #[must_use]
    pub fn find(&self, text: &str) -> Match {
        let mut matched: Vec<_> = self
            .defs
            .iter()
            .filter_map(|def| {
                def.pattern
                    .captures(text)
                    .map(|captures| (Arc::clone(def), captures))
            })
            .collect();

        match matched.len() {
            0 => Match::Undefined,
            1 => {
                let (definition, captures) = matched.swap_remove(0);
                Match::Single(StepMatch {
                    definition,
                    captures,
                })
            }
            _ => Match::Ambiguous(AmbiguousMatch {
                text: text.to_owned(),
                matches: matched
                    .into_iter()
                    .map(|(def, _)| (def.pattern.clone(), def.location))
                    .sorted()
                    .collect(),
            }),
        }
    }

    /// Registered definitions, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Definition>> {
        self.defs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn unique_match_is_order_independent() {
        let mut forward = Registry::new();
        forward
            .register(r"^passing step$", || ())
            .register(r"^I eat (\d+) cukes$", |_: i64| ());

        let mut backward = Registry::new();
        backward
            .register(r"^I eat (\d+) cukes$", |_: i64| ())
            .register(r"^passing step$", || ());

        for registry in [&forward, &backward] {
            let Match::Single(m) = registry.find("I eat 5 cukes") else {
                panic!("expected a unique match");
            };
            assert_eq!(m.captures, vec!["5".to_owned()]);
            assert_eq!(m.definition.pattern().source(), r"^I eat (\d+) cukes$");
        }
    }

    #[test]
    fn unmatched_text_is_undefined() {
        let mut registry = Registry::new();
        registry.register(r"^passing step$", || ());

        assert!(matches!(registry.find("missing step"), Match::Undefined));
    }

    #[test]
    fn overlapping_patterns_are_ambiguous() {
        let mut registry = Registry::new();
        registry
            .register(r"^..*ambiguous step$", || ())
            .register(r"^.*ambiguous step$", || ());

        let Match::Ambiguous(err) = registry.find("a very ambiguous step") else {
            panic!("expected an ambiguous match");
        };
        assert_eq!(err.matches.len(), 2);
        // Sorted by pattern, not by registration order.
        assert_eq!(err.matches[0].0.source(), r"^.*ambiguous step$");
        assert!(err.to_string().contains("matches multiple definitions"));
    }

    #[test]
    fn listing_preserves_registration_order() {
        let mut registry = Registry::new();
        registry
            .register(r"^second$", || ())
            .register(r"^first$", || ());

        let listed: Vec<_> = registry
            .iter()
            .map(|def| def.pattern().source().to_owned())
            .collect();
        assert_eq!(listed, vec!["^second$", "^first$"]);
    }

    #[test]
    #[should_panic(expected = "must be the last parameter")]
    fn structured_param_must_come_last() {
        use crate::pickle::Table;

        let mut registry = Registry::new();
        registry.register(r"^a table then a number (\d+)$", |_: Table, _: i64| ());
    }

    #[test]
    fn trailing_structured_param_needs_no_capture() {
        use crate::pickle::Table;

        let mut registry = Registry::new();
        registry.register(r"^the stock:$", |_: Table| ());

        assert_eq!(registry.len(), 1);
    }
}
