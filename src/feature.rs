// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compilation of Gherkin documents into [`Pickle`]s.

use std::sync::Arc;

use derive_more::{Display, Error};
use once_cell::sync::Lazy;
use regex::Regex;

use lazy_regex::regex;

use crate::pickle::{DocString, Pickle, PickleId, PickleStep, StepArgument, StepId, Table};

/// `<placeholder>` inside a scenario outline.
static TEMPLATE_REGEX: &Lazy<Regex> = regex!(r"<([^>\s]+)>");

/// A parsed feature document together with the pickles compiled from it.
#[derive(Clone, Debug)]
pub struct Feature {
    /// URI the document was loaded from (a path, or a caller-chosen name
    /// for in-memory sources).
    pub uri: String,

    /// The underlying Gherkin AST.
    pub document: gherkin::Feature,

    /// Raw document text, as parsed.
    pub source: String,

    /// Compiled pickles, in document order.
    pub pickles: Vec<Arc<Pickle>>,
}

/// A scenario outline references a placeholder its examples table does not
/// define.
#[derive(Clone, Debug, Display, Error)]
#[display("unknown placeholder <{name}> in {uri}:{line}")]
pub struct ExpandError {
    /// Placeholder name, without the angle brackets.
    pub name: String,

    /// URI of the offending document.
    pub uri: String,

    /// Line of the examples row being expanded.
    pub line: usize,
}

/// Monotonic id source for pickles and steps. One per run, shared across
/// all compiled features, so ids are run-unique.
#[derive(Debug, Default)]
pub struct IdGenerator {
    pickles: u64,
    steps: u64,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_pickle(&mut self) -> PickleId {
        self.pickles += 1;
        PickleId(self.pickles)
    }

    fn next_step(&mut self) -> StepId {
        self.steps += 1;
        StepId(self.steps)
    }
}

/// Compiles a parsed document into pickles: feature/rule backgrounds are
/// inlined ahead of every scenario's steps, rules are flattened, and each
/// scenario-outline examples row becomes its own pickle with
/// `<placeholder>`s substituted into the name, step texts, doc strings and
/// table cells.
pub fn compile(
    uri: impl Into<String>,
    document: gherkin::Feature,
    source: impl Into<String>,
    ids: &mut IdGenerator,
) -> Result<Feature, ExpandError> {
    let uri = uri.into();
    let mut pickles = Vec::new();

    let feature_background: Vec<gherkin::Step> = document
        .background
        .as_ref()
        .map(|bg| bg.steps.clone())
        .unwrap_or_default();

    for scenario in &document.scenarios {
        compile_scenario(
            scenario,
            &feature_background,
            &document.tags,
            &uri,
            ids,
            &mut pickles,
        )?;
    }
    for rule in &document.rules {
        let mut background = feature_background.clone();
        background.extend(
            rule.background
                .as_ref()
                .map(|bg| bg.steps.clone())
                .unwrap_or_default(),
        );
        let tags: Vec<String> = document
            .tags
            .iter()
            .chain(&rule.tags)
            .cloned()
            .collect();
        for scenario in &rule.scenarios {
            compile_scenario(scenario, &background, &tags, &uri, ids, &mut pickles)?;
        }
    }

    Ok(Feature {
        uri,
        document,
        source: source.into(),
        pickles,
    })
}

fn compile_scenario(
    scenario: &gherkin::Scenario,
    background: &[gherkin::Step],
    outer_tags: &[String],
    uri: &str,
    ids: &mut IdGenerator,
    out: &mut Vec<Arc<Pickle>>,
) -> Result<(), ExpandError> {
    let tags: Vec<String> = outer_tags
        .iter()
        .chain(&scenario.tags)
        .cloned()
        .collect();

    if scenario.examples.is_empty() {
        out.push(Arc::new(build_pickle(
            scenario.name.clone(),
            tags,
            scenario.position,
            background,
            &scenario.steps,
            None,
            uri,
            ids,
        )?));
        return Ok(());
    }

    for examples in &scenario.examples {
        let Some(table) = examples.table.as_ref() else {
            continue;
        };
        let Some((header, rows)) = table.rows.split_first() else {
            continue;
        };
        for (row_idx, row) in rows.iter().enumerate() {
            // Rows sit two lines below the `Examples:` keyword (header in
            // between), which gives each expanded pickle a usable position.
            let position = gherkin::LineCol {
                line: examples.position.line + row_idx + 2,
                col: examples.position.col,
            };
            let binding = Binding {
                header,
                row,
                uri,
                line: position.line,
            };
            let mut tags = tags.clone();
            tags.extend(examples.tags.iter().cloned());
            out.push(Arc::new(build_pickle(
                binding.substitute(&scenario.name)?,
                tags,
                position,
                background,
                &scenario.steps,
                Some(&binding),
                uri,
                ids,
            )?));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_pickle(
    name: String,
    tags: Vec<String>,
    position: gherkin::LineCol,
    background: &[gherkin::Step],
    steps: &[gherkin::Step],
    binding: Option<&Binding<'_>>,
    uri: &str,
    ids: &mut IdGenerator,
) -> Result<Pickle, ExpandError> {
    let id = ids.next_pickle();
    let mut compiled = Vec::with_capacity(background.len() + steps.len());
    for step in background {
        // Background steps carry no outline placeholders.
        compiled.push(compile_step(step, None, ids)?);
    }
    for step in steps {
        compiled.push(compile_step(step, binding, ids)?);
    }
    Ok(Pickle {
        id,
        uri: uri.to_owned(),
        name,
        tags,
        position,
        steps: compiled,
    })
}

fn compile_step(
    step: &gherkin::Step,
    binding: Option<&Binding<'_>>,
    ids: &mut IdGenerator,
) -> Result<PickleStep, ExpandError> {
    let substitute = |text: &str| match binding {
        Some(b) => b.substitute(text),
        None => Ok(text.to_owned()),
    };

    let argument = if let Some(docstring) = &step.docstring {
        Some(StepArgument::DocString(DocString::new(substitute(
            docstring,
        )?)))
    } else if let Some(table) = &step.table {
        let rows = table
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| substitute(cell)).collect())
            .collect::<Result<_, _>>()?;
        Some(StepArgument::Table(Table::new(rows)))
    } else {
        None
    };

    Ok(PickleStep {
        id: ids.next_step(),
        keyword: step.keyword.trim().to_owned(),
        text: substitute(&step.value)?,
        argument,
        position: step.position,
    })
}

/// One examples row bound to its header, ready to substitute.
struct Binding<'a> {
    header: &'a [String],
    row: &'a [String],
    uri: &'a str,
    line: usize,
}

impl Binding<'_> {
    fn substitute(&self, text: &str) -> Result<String, ExpandError> {
        let mut err = None;
        let replaced = TEMPLATE_REGEX.replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            self.header
                .iter()
                .position(|h| h == name)
                .and_then(|i| self.row.get(i))
                .cloned()
                .unwrap_or_else(|| {
                    err.get_or_insert_with(|| ExpandError {
                        name: name.to_owned(),
                        uri: self.uri.to_owned(),
                        line: self.line,
                    });
                    String::new()
                })
        });
        match err {
            Some(err) => Err(err),
            None => Ok(replaced.into_owned()),
        }
    }
}
