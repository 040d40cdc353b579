// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default [`Parser`] implementation.

use std::{fs, iter, path::Path};

use either::Either;
use gherkin::GherkinEnv;
use globwalk::GlobWalkerBuilder;
use itertools::Itertools as _;

use crate::{
    error::Error,
    parser::{Parser, Source},
};

/// Default [`Parser`]: a single `.feature` file is parsed directly, a
/// directory is walked recursively for `*.feature` files
/// (case-insensitively), sorted by path for a deterministic input order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Basic;

impl Basic {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses an in-memory feature source under a caller-chosen `uri`.
    pub fn parse_str(uri: impl Into<String>, source: impl Into<String>) -> Result<Source, Error> {
        let (uri, source) = (uri.into(), source.into());
        let document = gherkin::Feature::parse(&source, GherkinEnv::default())
            .map_err(|e| Error::Parse(format!("{uri}: {e}")))?;
        Ok(Source {
            uri,
            document,
            source,
        })
    }

    fn parse_file(path: &Path) -> Result<Source, Error> {
        let uri = path.display().to_string();
        let source = fs::read_to_string(path)
            .map_err(|e| Error::Parse(format!("{uri}: {e}")))?;
        Self::parse_str(uri, source)
    }
}

impl Parser for Basic {
    fn parse(&self, path: &str) -> Result<Vec<Source>, Error> {
        let path = Path::new(path);
        let files = if path.is_dir() {
            let walker = GlobWalkerBuilder::new(path, "*.feature")
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;
            Either::Left(
                walker
                    .filter_map(Result::ok)
                    .map(|entry| entry.path().to_path_buf())
                    .sorted(),
            )
        } else {
            Either::Right(iter::once(path.to_path_buf()))
        };
        files.into_iter().map(|file| Self::parse_file(&file)).collect()
    }
}

#[cfg(test)]
mod spec {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn parses_an_in_memory_source() {
        let source = Basic::parse_str(
            "basket.feature",
            "Feature: basket\n  Scenario: eating\n    When I eat 5 cukes\n",
        )
        .unwrap();

        assert_eq!(source.uri, "basket.feature");
        assert_eq!(source.document.scenarios.len(), 1);
    }

    #[test]
    fn malformed_source_is_a_parse_error() {
        let err = Basic::parse_str("broken.feature", "not gherkin at all").unwrap_err();

        assert!(err.to_string().contains("broken.feature"));
    }

    #[test]
    fn walks_a_directory_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.feature", "a.feature", "ignored.txt"] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(file, "Feature: {name}\n  Scenario: s\n    Given a step").unwrap();
        }

        let sources = Basic::new().parse(&dir.path().display().to_string()).unwrap();

        let uris: Vec<_> = sources.iter().map(|s| &s.uri).collect();
        assert_eq!(sources.len(), 2);
        assert!(uris[0].ends_with("a.feature"));
        assert!(uris[1].ends_with("b.feature"));
    }
}
