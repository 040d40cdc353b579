// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Location`] of a step definition in the source code.

use std::panic;

use derive_more::Display;

/// Source location a step definition was registered at.
///
/// Captured automatically through `#[track_caller]` on registration
/// methods, so ambiguity errors and `--definitions` listings can point at
/// the offending `step()` call.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{path}:{line}:{column}")]
pub struct Location {
    /// Path of the source file.
    pub path: &'static str,

    /// Line inside the source file, 1-based.
    pub line: u32,

    /// Column inside the source file, 1-based.
    pub column: u32,
}

impl Location {
    /// Location of the caller of the (`#[track_caller]`) function invoking
    /// this method.
    #[must_use]
    #[track_caller]
    pub fn from_caller() -> Self {
        panic::Location::caller().into()
    }
}

impl From<&'static panic::Location<'static>> for Location {
    fn from(loc: &'static panic::Location<'static>) -> Self {
        Self {
            path: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}
