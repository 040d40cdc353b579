// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Before/after hook chains at suite, scenario and step scope.

use std::fmt;

use crate::{
    error::Failure,
    pickle::{Pickle, PickleStep},
    runner::trap,
    Context,
};

type SuiteHook = Box<dyn Fn(Context) -> Result<Context, Failure> + Send + Sync>;
type ScenarioHook = Box<dyn Fn(Context, &Pickle) -> Result<Context, Failure> + Send + Sync>;
type StepHook = Box<dyn Fn(Context, &PickleStep) -> Result<Context, Failure> + Send + Sync>;

/// Registration-ordered hook chains.
///
/// Within one chain, hooks run in registration order and thread the
/// [`Context`] through. A failing (or panicking) hook aborts the rest of
/// its own chain; enclosing after-chains still run. The chain's result
/// carries the last successfully produced [`Context`] alongside the
/// failure, so cleanup hooks see whatever state was built up.
#[derive(Default)]
pub struct Hooks {
    before_suite: Vec<SuiteHook>,
    after_suite: Vec<SuiteHook>,
    before_scenario: Vec<ScenarioHook>,
    after_scenario: Vec<ScenarioHook>,
    before_step: Vec<StepHook>,
    after_step: Vec<StepHook>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs once before any pickle, seeding the base [`Context`].
    pub fn before_suite<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.before_suite.push(Box::new(hook));
        self
    }

    /// Runs once after the last pickle, even when the run stopped early.
    pub fn after_suite<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.after_suite.push(Box::new(hook));
        self
    }

    pub fn before_scenario<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &Pickle) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.before_scenario.push(Box::new(hook));
        self
    }

    /// Runs after every scenario, also after failed or skipped ones.
    pub fn after_scenario<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &Pickle) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.after_scenario.push(Box::new(hook));
        self
    }

    pub fn before_step<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &PickleStep) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.before_step.push(Box::new(hook));
        self
    }

    /// Runs after every step, also around skipped step bodies.
    pub fn after_step<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &PickleStep) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.after_step.push(Box::new(hook));
        self
    }

    pub(crate) fn run_before_suite(&self, ctx: Context) -> (Context, Option<Failure>) {
        run_suite_chain(&self.before_suite, ctx)
    }

    pub(crate) fn run_after_suite(&self, ctx: Context) -> (Context, Option<Failure>) {
        run_suite_chain(&self.after_suite, ctx)
    }

    pub(crate) fn run_before_scenario(
        &self,
        ctx: Context,
        pickle: &Pickle,
    ) -> (Context, Option<Failure>) {
        run_chain(&self.before_scenario, ctx, pickle)
    }

    pub(crate) fn run_after_scenario(
        &self,
        ctx: Context,
        pickle: &Pickle,
    ) -> (Context, Option<Failure>) {
        run_chain(&self.after_scenario, ctx, pickle)
    }

    pub(crate) fn run_before_step(
        &self,
        ctx: Context,
        step: &PickleStep,
    ) -> (Context, Option<Failure>) {
        run_chain(&self.before_step, ctx, step)
    }

    pub(crate) fn run_after_step(
        &self,
        ctx: Context,
        step: &PickleStep,
    ) -> (Context, Option<Failure>) {
        run_chain(&self.after_step, ctx, step)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_suite", &self.before_suite.len())
            .field("after_suite", &self.after_suite.len())
            .field("before_scenario", &self.before_scenario.len())
            .field("after_scenario", &self.after_scenario.len())
            .field("before_step", &self.before_step.len())
            .field("after_step", &self.after_step.len())
            .finish()
    }
}

fn run_suite_chain(hooks: &[SuiteHook], mut ctx: Context) -> (Context, Option<Failure>) {
    for hook in hooks {
        match trap::catch(|| hook(ctx.clone())) {
            Ok(Ok(next)) => ctx = next,
            Ok(Err(failure)) => return (ctx, Some(failure)),
            Err(panicked) => return (ctx, Some(panicked)),
        }
    }
    (ctx, None)
}

fn run_chain<T: ?Sized>(
    hooks: &[Box<dyn Fn(Context, &T) -> Result<Context, Failure> + Send + Sync>],
    mut ctx: Context,
    arg: &T,
) -> (Context, Option<Failure>) {
    for hook in hooks {
        match trap::catch(|| hook(ctx.clone(), arg)) {
            Ok(Ok(next)) => ctx = next,
            Ok(Err(failure)) => return (ctx, Some(failure)),
            Err(panicked) => return (ctx, Some(panicked)),
        }
    }
    (ctx, None)
}

#[cfg(test)]
mod spec {
    use super::*;
    use crate::pickle::PickleId;

    fn pickle() -> Pickle {
        Pickle {
            id: PickleId(1),
            uri: "basket.feature".into(),
            name: "eating".into(),
            tags: vec![],
            position: gherkin::LineCol { line: 3, col: 3 },
            steps: vec![],
        }
    }

    #[test]
    fn chain_runs_in_registration_order_and_threads_context() {
        let mut hooks = Hooks::new();
        hooks
            .before_scenario(|ctx, _| Ok(ctx.with("order", vec![1_i32])))
            .before_scenario(|ctx, _| {
                let mut order = ctx.get::<Vec<i32>>("order").cloned().unwrap_or_default();
                order.push(2);
                Ok(ctx.with("order", order))
            });

        let (ctx, failure) = hooks.run_before_scenario(Context::new(), &pickle());

        assert!(failure.is_none());
        assert_eq!(ctx.get::<Vec<i32>>("order"), Some(&vec![1, 2]));
    }

    #[test]
    fn failing_hook_aborts_the_rest_of_its_chain() {
        let mut hooks = Hooks::new();
        hooks
            .before_scenario(|_, _| Err("no basket".into()))
            .before_scenario(|ctx, _| Ok(ctx.with("ran", true)));

        let (ctx, failure) = hooks.run_before_scenario(Context::new(), &pickle());

        assert_eq!(failure.map(|f| f.to_string()), Some("no basket".into()));
        assert!(!ctx.contains("ran"));
    }

    #[test]
    fn panicking_hook_is_reported_as_a_failure() {
        let mut hooks = Hooks::new();
        hooks.before_suite(|_| panic!("hook exploded"));

        let (_, failure) = hooks.run_before_suite(Context::new());

        let failure = failure.expect("the panic must surface as a failure");
        assert!(failure.to_string().contains("hook exploded"));
    }

    #[test]
    fn failure_keeps_the_context_built_so_far() {
        let mut hooks = Hooks::new();
        hooks
            .before_scenario(|ctx, _| Ok(ctx.with("built", 1_i32)))
            .before_scenario(|_, _| Err("later failure".into()));

        let (ctx, failure) = hooks.run_before_scenario(Context::new(), &pickle());

        assert!(failure.is_some());
        assert_eq!(ctx.get::<i32>("built"), Some(&1));
    }
}
