// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Regex [`Pattern`] a step definition is keyed by.

use std::cmp::Ordering;

use derive_more::Display;
use regex::Regex;
use sealed::sealed;

/// Compiled pattern of a step definition.
///
/// Matching is whole-text: a pattern written without anchors is implicitly
/// anchored on both ends, so `"I have (\d+) cukes"` does not match
/// `"oh, I have 5 cukes today"`.
#[derive(Clone, Debug, Display)]
#[display("{source}")]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Original pattern text, as registered.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Matches `text` in full and extracts capture groups in order.
    /// Unmatched optional groups come back as empty strings.
    pub(crate) fn captures(&self, text: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(text)?;
        Some(
            (1..caps.len())
                .map(|i| caps.get(i).map_or_else(String::new, |m| m.as_str().to_owned()))
                .collect(),
        )
    }

    /// Number of capture groups the pattern defines.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    fn anchored(source: &str) -> String {
        let mut anchored = String::with_capacity(source.len() + 4);
        if !source.starts_with('^') {
            anchored.push('^');
        }
        anchored.push_str(source);
        if !source.ends_with('$') {
            anchored.push('$');
        }
        anchored
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl PartialOrd for Pattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source.cmp(&other.source)
    }
}

/// Conversion into a [`Pattern`] at registration time.
///
/// Registering a definition is configuration, so a malformed regex panics
/// right there rather than surfacing later as a mysterious undefined step.
#[sealed]
pub trait IntoPattern {
    /// Converts this value into a [`Pattern`].
    ///
    /// # Panics
    ///
    /// If the value is not a valid regular expression.
    #[must_use]
    fn into_pattern(self) -> Pattern;
}

#[sealed]
impl IntoPattern for &str {
    fn into_pattern(self) -> Pattern {
        let regex = Regex::new(&Pattern::anchored(self))
            .unwrap_or_else(|e| panic!("invalid step pattern `{self}`: {e}"));
        Pattern {
            source: self.to_owned(),
            regex,
        }
    }
}

#[sealed]
impl IntoPattern for String {
    fn into_pattern(self) -> Pattern {
        self.as_str().into_pattern()
    }
}

#[sealed]
impl IntoPattern for Regex {
    fn into_pattern(self) -> Pattern {
        Pattern {
            source: self.as_str().to_owned(),
            regex: self,
        }
    }
}

#[sealed]
impl IntoPattern for Pattern {
    fn into_pattern(self) -> Pattern {
        self
    }
}
