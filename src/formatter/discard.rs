// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! No-op [`Discard`] formatter.

use crate::formatter::Formatter;

/// Swallows every callback. Useful when only exit codes or [`Storage`]
/// queries matter.
///
/// [`Storage`]: crate::storage::Storage
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl Formatter for Discard {
    fn supports_concurrency(&self) -> bool {
        true
    }
}
