// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for parsing Gherkin feature sources.

pub mod basic;

use crate::error::Error;

#[doc(inline)]
pub use self::basic::Basic;

/// A parsed feature document, not yet compiled into pickles.
#[derive(Clone, Debug)]
pub struct Source {
    /// URI the document came from.
    pub uri: String,

    /// The parsed Gherkin AST.
    pub document: gherkin::Feature,

    /// Raw document text.
    pub source: String,
}

/// Source of parsed feature documents.
pub trait Parser {
    /// Parses the given `path` (a `.feature` file or a directory to scan
    /// for them) into feature [`Source`]s.
    fn parse(&self, path: &str) -> Result<Vec<Source>, Error>;
}
