// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Ambiguous step match error.

use std::fmt;

use crate::step::{Location, Pattern};

/// More than one registered pattern matched a step text.
///
/// Never resolved silently: the step terminates with the `Ambiguous`
/// status, carrying every conflicting pattern and where it was registered.
#[derive(Clone, Debug)]
pub struct AmbiguousMatch {
    /// Step text that matched more than once.
    pub text: String,

    /// Conflicting `(pattern, registration site)` pairs, sorted by pattern
    /// so the message is stable across registration orders.
    pub matches: Vec<(Pattern, Location)>,
}

impl fmt::Display for AmbiguousMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "step `{}` matches multiple definitions:", self.text)?;
        for (pattern, location) in &self.matches {
            writeln!(f, "  {pattern} --> {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AmbiguousMatch {}
