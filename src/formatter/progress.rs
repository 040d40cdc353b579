// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default [`Progress`] formatter.

use std::{io::Write as _, sync::Arc, time::Duration};

use console::Style;
use itertools::Itertools as _;

use crate::{
    error::Failure,
    formatter::{Formatter, Output},
    pickle::{Pickle, PickleStep},
    result::Status,
    step::{snippet, AmbiguousMatch},
    storage::Storage,
};

const STEPS_PER_LINE: usize = 70;

/// One character per step, a summary with failure details and
/// registration snippets for undefined steps at the end.
pub struct Progress {
    out: Output,
    styles: Styles,
    storage: Option<Arc<Storage>>,
    emitted: usize,
}

impl Progress {
    #[must_use]
    pub fn new(out: Output, no_colors: bool) -> Self {
        Self {
            out,
            styles: Styles::new(no_colors),
            storage: None,
            emitted: 0,
        }
    }

    fn tick(&mut self, status: Status) {
        let symbol = match status {
            Status::Passed => ".",
            Status::Failed => "F",
            Status::Skipped => "-",
            Status::Undefined => "U",
            Status::Pending => "P",
            Status::Ambiguous => "A",
        };
        let styled = self.styles.apply(status, symbol);
        let _ = write!(self.out, "{styled}");
        self.emitted += 1;
        if self.emitted % STEPS_PER_LINE == 0 {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }

    fn write_failures(&mut self, storage: &Storage) {
        let failed: Vec<_> = storage
            .pickle_results()
            .into_iter()
            .filter(|r| r.status == Status::Failed)
            .collect();
        if failed.is_empty() {
            return;
        }

        let _ = writeln!(
            self.out,
            "\n--- {}",
            self.styles.failed.apply_to("Failed scenarios:"),
        );
        for result in failed {
            let pickle = storage.pickle(result.pickle_id);
            let _ = writeln!(
                self.out,
                "\n  Scenario: {} # {}:{}",
                pickle.name, pickle.uri, pickle.position.line,
            );
            for step in storage.step_results_of(result.pickle_id) {
                if !matches!(step.status, Status::Failed | Status::Ambiguous) {
                    continue;
                }
                let text = &storage.step(step.step_id).text;
                let _ = writeln!(self.out, "    {}", self.styles.failed.apply_to(text));
            }
            if let Some(error) = &result.error {
                let _ = writeln!(
                    self.out,
                    "      {}",
                    self.styles.failed.apply_to(format!("Error: {error}")),
                );
            }
            if result.attempts > 1 {
                let _ = writeln!(self.out, "      (after {} attempts)", result.attempts);
            }
        }
    }

    fn write_snippets(&mut self, storage: &Storage) {
        let undefined: Vec<String> = storage
            .steps_with_status(Status::Undefined)
            .into_iter()
            .map(|id| storage.step(id).text)
            .unique()
            .collect();
        if undefined.is_empty() {
            return;
        }

        let _ = writeln!(
            self.out,
            "\n{}",
            self.styles.undefined.apply_to(
                "You can implement step definitions for undefined steps \
                 with these snippets:",
            ),
        );
        for text in undefined {
            let _ = writeln!(self.out, "\n{}", snippet::suggest(&text));
        }
    }

    fn write_tallies(&mut self, storage: &Storage) {
        let pickles = storage.pickle_results();
        let pickle_counts = pickles.iter().counts_by(|r| r.status);
        let step_counts = pickles
            .iter()
            .flat_map(|r| storage.step_results_of(r.pickle_id))
            .counts_by(|r| r.status);
        let total_steps: usize = step_counts.values().sum();

        let render = |counts: &std::collections::HashMap<Status, usize>| {
            Status::ALL
                .iter()
                .filter_map(|status| {
                    counts.get(status).map(|n| {
                        self.styles
                            .apply(*status, &format!("{n} {status}"))
                            .to_string()
                    })
                })
                .join(", ")
        };

        let _ = writeln!(self.out);
        if pickles.is_empty() {
            let _ = writeln!(self.out, "No scenarios");
        } else {
            let _ = writeln!(
                self.out,
                "{} scenarios ({})",
                pickles.len(),
                render(&pickle_counts),
            );
        }
        if total_steps == 0 {
            let _ = writeln!(self.out, "No steps");
        } else {
            let _ = writeln!(
                self.out,
                "{total_steps} steps ({})",
                render(&step_counts),
            );
        }

        // Sub-millisecond noise does not belong in a summary.
        let elapsed = Duration::from_millis(storage.elapsed().as_millis() as u64);
        let _ = writeln!(self.out, "took {}", humantime::format_duration(elapsed));

        if let Some(seed) = storage.seed() {
            let _ = writeln!(self.out, "--- Randomized with seed: {seed}");
        }
    }
}

impl Formatter for Progress {
    fn passed(&mut self, _: &Pickle, _: &PickleStep) {
        self.tick(Status::Passed);
    }

    fn skipped(&mut self, _: &Pickle, _: &PickleStep) {
        self.tick(Status::Skipped);
    }

    fn undefined(&mut self, _: &Pickle, _: &PickleStep) {
        self.tick(Status::Undefined);
    }

    fn pending(&mut self, _: &Pickle, _: &PickleStep) {
        self.tick(Status::Pending);
    }

    fn failed(&mut self, _: &Pickle, _: &PickleStep, _: &Failure) {
        self.tick(Status::Failed);
    }

    fn ambiguous(&mut self, _: &Pickle, _: &PickleStep, _: &AmbiguousMatch) {
        self.tick(Status::Ambiguous);
    }

    fn summary(&mut self) {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        let _ = writeln!(self.out);
        self.write_failures(&storage);
        self.write_tallies(&storage);
        self.write_snippets(&storage);
        let _ = self.out.flush();
    }

    fn set_storage(&mut self, storage: Arc<Storage>) {
        self.storage = Some(storage);
    }

    fn supports_concurrency(&self) -> bool {
        true
    }
}

struct Styles {
    passed: Style,
    failed: Style,
    skipped: Style,
    undefined: Style,
}

impl Styles {
    fn new(no_colors: bool) -> Self {
        if no_colors {
            Self {
                passed: Style::new(),
                failed: Style::new(),
                skipped: Style::new(),
                undefined: Style::new(),
            }
        } else {
            Self {
                passed: Style::new().green(),
                failed: Style::new().red(),
                skipped: Style::new().cyan(),
                undefined: Style::new().yellow(),
            }
        }
    }

    fn apply(&self, status: Status, text: &str) -> String {
        let style = match status {
            Status::Passed => &self.passed,
            Status::Failed | Status::Ambiguous => &self.failed,
            Status::Skipped => &self.skipped,
            Status::Undefined | Status::Pending => &self.undefined,
        };
        style.apply_to(text).to_string()
    }
}
