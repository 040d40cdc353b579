// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution of a single pickle.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use crate::{
    error::Failure,
    formatter::Formatter,
    hook::Hooks,
    pickle::{Pickle, PickleStep},
    result::{PickleResult, Status, StepResult},
    runner::trap,
    step::{handler::Outcome, AmbiguousMatch, Definition, Match, Registry},
    storage::Storage,
    Context,
};

/// Shared sink the runner reports through. Boxed so suites can inject any
/// formatter; mutexed so workers of a concurrent run serialize on it only
/// for the duration of one pickle's flush.
pub(crate) type SharedFormatter = Mutex<Box<dyn Formatter + Send>>;

/// Runs pickles one at a time: document-order steps, skip cascade,
/// whole-pickle retries and per-pickle event buffering.
///
/// Events for one pickle are buffered until its final attempt finished and
/// then flushed to the formatter in one go. Formatters therefore see each
/// pickle as an uninterrupted block (even when workers interleave) and
/// never see abandoned attempts.
pub(crate) struct PickleRunner<'a> {
    registry: &'a Registry,
    hooks: &'a Hooks,
    storage: &'a Storage,
    formatter: &'a SharedFormatter,
    max_attempts: usize,
}

/// Terminal verdict of one step of one attempt.
enum Verdict {
    Passed,
    Skipped,
    Undefined,
    Pending,
    Failed(Arc<Failure>),
    Ambiguous(Arc<AmbiguousMatch>),
}

impl Verdict {
    fn status(&self) -> Status {
        match self {
            Self::Passed => Status::Passed,
            Self::Skipped => Status::Skipped,
            Self::Undefined => Status::Undefined,
            Self::Pending => Status::Pending,
            Self::Failed(_) => Status::Failed,
            Self::Ambiguous(_) => Status::Ambiguous,
        }
    }

    fn failure(&self) -> Option<Arc<Failure>> {
        match self {
            Self::Failed(f) => Some(Arc::clone(f)),
            Self::Ambiguous(a) => Some(Arc::new(Failure::new((**a).clone()))),
            _ => None,
        }
    }
}

/// Buffered per-step outcome of the final attempt, aligned one-to-one
/// with `pickle.steps`.
struct StepRecord {
    definition: Option<Arc<Definition>>,
    verdict: Verdict,
}

impl<'a> PickleRunner<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        hooks: &'a Hooks,
        storage: &'a Storage,
        formatter: &'a SharedFormatter,
        max_retries: usize,
    ) -> Self {
        Self {
            registry,
            hooks,
            storage,
            formatter,
            // `max_retries` counts re-attempts on top of the initial run.
            max_attempts: max_retries.saturating_add(1),
        }
    }

    /// Runs the pickle to its final status, retrying from the top on
    /// retryable failures while the budget allows.
    pub(crate) fn run(&self, pickle: &Arc<Pickle>, base: &Context) -> Status {
        let started = Instant::now();
        let mut attempt = 1;
        loop {
            let (status, records, wants_retry, error) =
                self.run_attempt(pickle, base.clone(), attempt);
            if wants_retry && attempt < self.max_attempts {
                attempt += 1;
                continue;
            }
            self.storage.insert_pickle_result(PickleResult {
                pickle_id: pickle.id,
                status,
                error,
                attempts: attempt,
                duration: started.elapsed(),
            });
            self.flush(pickle, &records);
            return status;
        }
    }

    /// Records the pickle and all its steps as [`Status::Skipped`] without
    /// executing anything. Used once stop-on-failure tripped.
    pub(crate) fn skip(&self, pickle: &Arc<Pickle>) {
        for step in &pickle.steps {
            self.storage.insert_step_result(StepResult {
                step_id: step.id,
                pickle_id: pickle.id,
                status: Status::Skipped,
                definition: None,
                error: None,
                attempt: 1,
                duration: std::time::Duration::ZERO,
            });
        }
        self.storage.insert_pickle_result(PickleResult {
            pickle_id: pickle.id,
            status: Status::Skipped,
            error: None,
            attempts: 1,
            duration: std::time::Duration::ZERO,
        });

        let records: Vec<_> = pickle
            .steps
            .iter()
            .map(|_| StepRecord {
                definition: None,
                verdict: Verdict::Skipped,
            })
            .collect();
        self.flush(pickle, &records);
    }

    fn run_attempt(
        &self,
        pickle: &Arc<Pickle>,
        base: Context,
        attempt: usize,
    ) -> (Status, Vec<StepRecord>, bool, Option<Arc<Failure>>) {
        let (mut ctx, hook_failure) = self.hooks.run_before_scenario(base, pickle);
        let mut error = hook_failure.map(Arc::new);
        let mut halted = error.is_some();
        let mut wants_retry = false;
        let mut records = Vec::with_capacity(pickle.steps.len());

        for step in &pickle.steps {
            let started = Instant::now();
            let (record, next_ctx) = if halted {
                // Cascade: the body is skipped, step hooks still fire.
                let (ctx, _) = self.hooks.run_before_step(ctx.clone(), step);
                let (ctx, _) = self.hooks.run_after_step(ctx, step);
                (
                    StepRecord {
                        definition: None,
                        verdict: Verdict::Skipped,
                    },
                    ctx,
                )
            } else {
                self.run_step(step, ctx.clone())
            };
            ctx = next_ctx;

            match &record.verdict {
                Verdict::Passed | Verdict::Skipped => {}
                Verdict::Failed(failure) => {
                    halted = true;
                    wants_retry = failure.is_retryable();
                    error.get_or_insert_with(|| Arc::clone(failure));
                }
                Verdict::Undefined | Verdict::Pending | Verdict::Ambiguous(_) => {
                    halted = true;
                    if let Some(failure) = record.verdict.failure() {
                        error.get_or_insert(failure);
                    }
                }
            }

            self.storage.insert_step_result(StepResult {
                step_id: step.id,
                pickle_id: pickle.id,
                status: record.verdict.status(),
                definition: record.definition.as_ref().map(Arc::clone),
                error: record.verdict.failure(),
                attempt,
                duration: started.elapsed(),
            });
            records.push(record);
        }

        let mut status = derive_status(&records, error.is_some());

        let (_, after_failure) = self.hooks.run_after_scenario(ctx, pickle);
        if let Some(failure) = after_failure {
            status = Status::Failed;
            error.get_or_insert(Arc::new(failure));
        }

        (status, records, wants_retry, error)
    }

    fn run_step(&self, step: &PickleStep, ctx: Context) -> (StepRecord, Context) {
        let matched = match self.registry.find(&step.text) {
            Match::Undefined => {
                return (
                    StepRecord {
                        definition: None,
                        verdict: Verdict::Undefined,
                    },
                    ctx,
                );
            }
            Match::Ambiguous(err) => {
                return (
                    StepRecord {
                        definition: None,
                        verdict: Verdict::Ambiguous(Arc::new(err)),
                    },
                    ctx,
                );
            }
            Match::Single(m) => m,
        };
        let definition = matched.definition;

        let record = |verdict| StepRecord {
            definition: Some(Arc::clone(&definition)),
            verdict,
        };

        let values = match crate::step::args::bind(
            &matched.captures,
            step.argument.as_ref(),
            definition.param_types(),
        ) {
            Ok(values) => values,
            Err(err) => {
                return (record(Verdict::Failed(Arc::new(Failure::new(err)))), ctx);
            }
        };

        let (hook_ctx, hook_failure) = self.hooks.run_before_step(ctx, step);
        if let Some(failure) = hook_failure {
            let (ctx, _) = self.hooks.run_after_step(hook_ctx, step);
            return (record(Verdict::Failed(Arc::new(failure))), ctx);
        }

        let outcome = match trap::catch(|| definition.call(hook_ctx.clone(), values)) {
            Ok(outcome) => outcome,
            Err(panicked) => Outcome::Failed(panicked),
        };
        let (verdict, ctx) = match outcome {
            Outcome::Passed(next) => (Verdict::Passed, next),
            Outcome::Failed(failure) if failure.is_pending() => {
                (Verdict::Pending, hook_ctx)
            }
            Outcome::Failed(failure) => (Verdict::Failed(Arc::new(failure)), hook_ctx),
            Outcome::Nested(texts, next) => match self.run_nested(&texts, next) {
                Ok(next) => (Verdict::Passed, next),
                Err(failure) if failure.is_pending() => (Verdict::Pending, hook_ctx),
                Err(failure) => (Verdict::Failed(Arc::new(failure)), hook_ctx),
            },
        };

        let (ctx, after_failure) = self.hooks.run_after_step(ctx, step);
        let verdict = match (after_failure, verdict) {
            (Some(failure), Verdict::Passed) => Verdict::Failed(Arc::new(failure)),
            (_, verdict) => verdict,
        };
        (record(verdict), ctx)
    }

    /// Resolves and executes nested step texts in place of their parent.
    /// Any problem fails the parent step with a descriptive cause.
    fn run_nested(&self, texts: &[String], mut ctx: Context) -> Result<Context, Failure> {
        for text in texts {
            let matched = match self.registry.find(text) {
                Match::Undefined => {
                    return Err(Failure::msg(format!("undefined nested step `{text}`")));
                }
                Match::Ambiguous(err) => return Err(Failure::new(err)),
                Match::Single(m) => m,
            };
            if matched
                .definition
                .param_types()
                .last()
                .is_some_and(|p| p.is_structured())
            {
                return Err(Failure::msg(format!(
                    "nested step `{text}` resolves to a definition requiring \
                     a doc string or data table, which nested steps cannot \
                     carry",
                )));
            }
            let values = crate::step::args::bind(
                &matched.captures,
                None,
                matched.definition.param_types(),
            )
            .map_err(Failure::new)?;

            match trap::catch(|| matched.definition.call(ctx.clone(), values))? {
                Outcome::Passed(next) => ctx = next,
                Outcome::Failed(failure) => return Err(failure),
                Outcome::Nested(more, next) => ctx = self.run_nested(&more, next)?,
            }
        }
        Ok(ctx)
    }

    fn flush(&self, pickle: &Pickle, records: &[StepRecord]) {
        let mut fmt = lock(self.formatter);
        fmt.pickle(pickle);
        for (step, record) in pickle.steps.iter().zip(records) {
            fmt.defined(pickle, step, record.definition.as_deref());
            match &record.verdict {
                Verdict::Passed => fmt.passed(pickle, step),
                Verdict::Skipped => fmt.skipped(pickle, step),
                Verdict::Undefined => fmt.undefined(pickle, step),
                Verdict::Pending => fmt.pending(pickle, step),
                Verdict::Failed(failure) => fmt.failed(pickle, step, failure),
                Verdict::Ambiguous(err) => fmt.ambiguous(pickle, step, err),
            }
        }
    }
}

/// First non-passed step decides, with `Failed` dominating: any failed or
/// ambiguous step fails the pickle; otherwise pending, then undefined,
/// then passed.
fn derive_status(records: &[StepRecord], failed: bool) -> Status {
    if failed
        || records
            .iter()
            .any(|r| matches!(r.verdict, Verdict::Failed(_) | Verdict::Ambiguous(_)))
    {
        return Status::Failed;
    }
    if records.iter().any(|r| matches!(r.verdict, Verdict::Pending)) {
        return Status::Pending;
    }
    if records
        .iter()
        .any(|r| matches!(r.verdict, Verdict::Undefined))
    {
        return Status::Undefined;
    }
    Status::Passed
}

pub(crate) fn lock(formatter: &SharedFormatter) -> MutexGuard<'_, Box<dyn Formatter + Send>> {
    formatter.lock().unwrap_or_else(PoisonError::into_inner)
}
