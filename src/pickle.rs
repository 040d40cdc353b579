// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compiled, immutable scenario model.
//!
//! A [`Pickle`] is one runnable scenario: backgrounds inlined, rules
//! flattened and outline placeholders substituted. Runners and formatters
//! only ever see pickles, never the raw Gherkin AST.

use std::collections::HashMap;

use derive_more::{Deref, Display};

/// Unique identifier of a [`Pickle`] within one run.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PickleId(pub(crate) u64);

/// Unique identifier of a [`PickleStep`] within one run.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StepId(pub(crate) u64);

/// One compiled scenario.
#[derive(Clone, Debug)]
pub struct Pickle {
    /// Run-unique identifier.
    pub id: PickleId,

    /// URI of the feature document this [`Pickle`] was compiled from.
    pub uri: String,

    /// Scenario name, with outline placeholders substituted.
    pub name: String,

    /// Inherited feature/rule tags plus the scenario's own, in document
    /// order, without the leading `@`.
    pub tags: Vec<String>,

    /// Position of the scenario (or examples row) in the source document.
    pub position: gherkin::LineCol,

    /// Steps in strict document order, background steps first.
    pub steps: Vec<PickleStep>,
}

/// One step of a [`Pickle`].
#[derive(Clone, Debug)]
pub struct PickleStep {
    /// Run-unique identifier.
    pub id: StepId,

    /// Keyword as written (`Given`, `When`, `Then`, `And`, `But`).
    pub keyword: String,

    /// Step text with outline placeholders substituted. This is what gets
    /// matched against registered patterns.
    pub text: String,

    /// Optional trailing doc string or data table.
    pub argument: Option<StepArgument>,

    /// Position of the step in the source document.
    pub position: gherkin::LineCol,
}

/// Structured argument attached to a [`PickleStep`].
#[derive(Clone, Debug)]
pub enum StepArgument {
    DocString(DocString),
    Table(Table),
}

/// Multi-line text block attached to a step.
#[derive(Clone, Debug, Deref, Display, Eq, PartialEq)]
#[display("{content}")]
pub struct DocString {
    /// The block's content, without the triple-quote fences.
    #[deref]
    pub content: String,

    /// Optional media type annotation after the opening fence.
    pub media_type: Option<String>,
}

impl DocString {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            media_type: None,
        }
    }
}

/// Data table attached to a step.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table {
    /// All rows, including the header row (if the table has one).
    pub rows: Vec<Vec<String>>,
}

impl Table {
    #[must_use]
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// All rows as raw cells.
    #[must_use]
    pub fn raw(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Interprets the first row as a header and maps every following row
    /// into a header→cell [`HashMap`]. Rows shorter than the header omit
    /// the missing keys.
    #[must_use]
    pub fn hashes(&self) -> Vec<HashMap<String, String>> {
        let Some((header, body)) = self.rows.split_first() else {
            return Vec::new();
        };
        body.iter()
            .map(|row| {
                header
                    .iter()
                    .zip(row)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }
}

impl From<&gherkin::Table> for Table {
    fn from(table: &gherkin::Table) -> Self {
        Self {
            rows: table.rows.clone(),
        }
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    fn fixture() -> Table {
        Table::new(vec![
            vec!["name".into(), "color".into()],
            vec!["kiwi".into(), "green".into()],
            vec!["plum".into(), "purple".into()],
        ])
    }

    #[test]
    fn hashes_keys_rows_by_header() {
        let hashes = fixture().hashes();

        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0]["name"], "kiwi");
        assert_eq!(hashes[1]["color"], "purple");
    }

    #[test]
    fn hashes_of_header_only_table_are_empty() {
        let table = Table::new(vec![vec!["name".into()]]);

        assert!(table.hashes().is_empty());
        assert!(Table::default().hashes().is_empty());
    }

    #[test]
    fn raw_keeps_the_header_row() {
        assert_eq!(fixture().raw().len(), 3);
    }
}
