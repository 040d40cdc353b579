// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level [`Suite`] composition root.

use std::{fmt, io, mem, process, sync::Arc, sync::Mutex};

use gherkin::tagexpr::TagOperation;
use smart_default::SmartDefault;

use crate::{
    context::{CancelToken, Context},
    error::{Error, Failure},
    feature::{compile, Feature, IdGenerator},
    formatter::{self, Config, Formatter, Output},
    hook::Hooks,
    parser::{Basic, Parser, Source},
    pickle::{Pickle, PickleStep},
    result::Status,
    runner::{self, exec, trap, PickleRunner, Scheduler, Shard},
    step::{Handler, IntoPattern, Registry},
    storage::Storage,
    tag::Ext as _,
};

/// Process outcome of a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitStatus {
    /// Every pickle passed (modulo strictness).
    Passed,

    /// Some pickle failed, or strict mode saw pending/undefined/ambiguous
    /// outcomes.
    Failed,

    /// The run never started: bad configuration or unparsable input.
    UsageError,
}

impl ExitStatus {
    /// Conventional process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
            Self::UsageError => 2,
        }
    }

    /// Terminates the process with [`ExitStatus::code()`].
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }
}

/// Configuration bag of a [`Suite`] run.
#[derive(SmartDefault)]
pub struct Options {
    /// Formatter name to instantiate from the formatter registry.
    #[default(String::from("progress"))]
    pub format: String,

    /// Boolean tag expression filtering pickles before scheduling.
    pub tags: Option<TagOperation>,

    /// Number of worker threads. Values below two run on the calling
    /// thread.
    #[default(1)]
    pub concurrency: usize,

    /// Treat pending/undefined/ambiguous outcomes as failure for the exit
    /// code.
    pub strict: bool,

    /// Skip every pickle starting after the first failed one.
    pub stop_on_failure: bool,

    /// Disable terminal styling.
    pub no_colors: bool,

    /// Execution-order shuffle: `0` off, `-1` auto-derived seed, anything
    /// else is the seed itself.
    pub randomize: i64,

    /// Feature files or directories to parse.
    pub paths: Vec<String>,

    /// Partition pair for splitting pickles across external worker nodes.
    pub shard: Option<Shard>,

    /// Re-attempts allowed per pickle on retryable failures, on top of
    /// the initial run. `0` disables retrying.
    pub max_retries: usize,

    /// List registered step definitions instead of running anything.
    pub definitions: bool,

    /// Formatter sink. Defaults to stdout.
    pub output: Option<Output>,

    /// Cancellation observed cooperatively by running steps.
    pub cancel: Option<CancelToken>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("format", &self.format)
            .field("concurrency", &self.concurrency)
            .field("strict", &self.strict)
            .field("stop_on_failure", &self.stop_on_failure)
            .field("no_colors", &self.no_colors)
            .field("randomize", &self.randomize)
            .field("paths", &self.paths)
            .field("shard", &self.shard)
            .field("max_retries", &self.max_retries)
            .field("definitions", &self.definitions)
            .finish_non_exhaustive()
    }
}

/// Owns everything a run needs: step registry, hook chains, formatter
/// registry, parser and [`Options`]. Wire it up, then [`Suite::run()`].
///
/// ```no_run
/// let mut suite = cornichon::Suite::new();
/// suite
///     .step(r"^I eat (\d+) cukes$", |n: i64| {
///         assert_eq!(n, 5);
///     })
///     .options_mut()
///     .paths = vec!["tests/features".into()];
/// suite.run().exit();
/// ```
#[derive(Default)]
pub struct Suite {
    registry: Registry,
    hooks: Hooks,
    formatters: formatter::Registry,
    parser: Option<Box<dyn Parser>>,
    options: Options,
    sources: Vec<Source>,
    formatter_override: Option<Box<dyn Formatter + Send>>,
}

impl Suite {
    #[must_use]
    pub fn new() -> Self {
        Self {
            formatters: formatter::Registry::new(),
            ..Self::default()
        }
    }

    /// Registers a step definition. See [`Registry::register`] for the
    /// panics on invalid wiring.
    #[track_caller]
    pub fn step<M, H>(&mut self, pattern: impl IntoPattern, handler: H) -> &mut Self
    where
        H: Handler<M>,
    {
        self.registry.register(pattern, handler);
        self
    }

    /// Alias of [`Suite::step`]; the registry is keyword-agnostic.
    #[track_caller]
    pub fn given<M, H>(&mut self, pattern: impl IntoPattern, handler: H) -> &mut Self
    where
        H: Handler<M>,
    {
        self.step(pattern, handler)
    }

    /// Alias of [`Suite::step`]; the registry is keyword-agnostic.
    #[track_caller]
    pub fn when<M, H>(&mut self, pattern: impl IntoPattern, handler: H) -> &mut Self
    where
        H: Handler<M>,
    {
        self.step(pattern, handler)
    }

    /// Alias of [`Suite::step`]; the registry is keyword-agnostic.
    #[track_caller]
    pub fn then<M, H>(&mut self, pattern: impl IntoPattern, handler: H) -> &mut Self
    where
        H: Handler<M>,
    {
        self.step(pattern, handler)
    }

    pub fn before_suite<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.hooks.before_suite(hook);
        self
    }

    pub fn after_suite<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.hooks.after_suite(hook);
        self
    }

    pub fn before_scenario<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &Pickle) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.hooks.before_scenario(hook);
        self
    }

    pub fn after_scenario<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &Pickle) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.hooks.after_scenario(hook);
        self
    }

    pub fn before_step<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &PickleStep) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.hooks.before_step(hook);
        self
    }

    pub fn after_step<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Context, &PickleStep) -> Result<Context, Failure> + Send + Sync + 'static,
    {
        self.hooks.after_step(hook);
        self
    }

    /// Adds an in-memory feature source.
    pub fn feature(
        &mut self,
        uri: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        self.sources.push(Basic::parse_str(uri, source)?);
        Ok(self)
    }

    /// Replaces the feature [`Parser`] used for [`Options::paths`].
    pub fn with_parser(&mut self, parser: impl Parser + 'static) -> &mut Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Registers an additional formatter factory, selectable through
    /// [`Options::format`].
    pub fn register_formatter<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Output, Config) -> Box<dyn Formatter + Send> + Send + Sync + 'static,
    {
        self.formatters.register(name, factory);
        self
    }

    /// Uses the given formatter instance, bypassing name lookup and
    /// [`Options::format`].
    pub fn with_formatter(&mut self, formatter: impl Formatter + Send + 'static) -> &mut Self {
        self.formatter_override = Some(Box::new(formatter));
        self
    }

    #[must_use]
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn set_options(&mut self, options: Options) -> &mut Self {
        self.options = options;
        self
    }

    /// Writes every registered definition as `pattern # source-location`,
    /// in registration order.
    pub fn write_definitions(&self, mut out: impl io::Write) -> io::Result<()> {
        for def in self.registry.iter() {
            writeln!(out, "{} # {}", def.pattern(), def.location())?;
        }
        Ok(())
    }

    /// Runs the whole suite. Configuration problems are printed to stderr
    /// and reported as [`ExitStatus::UsageError`] instead of panicking.
    pub fn run(&mut self) -> ExitStatus {
        match self.try_run() {
            Ok(status) => status,
            Err(err) => {
                eprintln!("cornichon: {err}");
                ExitStatus::UsageError
            }
        }
    }

    /// Runs the whole suite, surfacing configuration errors to the
    /// caller.
    pub fn try_run(&mut self) -> Result<ExitStatus, Error> {
        let mut options = mem::take(&mut self.options);

        if options.definitions {
            let out = options
                .output
                .take()
                .unwrap_or_else(|| Box::new(io::stdout()));
            let _ = self.write_definitions(out);
            return Ok(ExitStatus::Passed);
        }

        // Parse everything up front; a bad feature aborts before any
        // pickle runs.
        let mut sources = mem::take(&mut self.sources);
        let parser = self
            .parser
            .take()
            .unwrap_or_else(|| Box::new(Basic::new()));
        for path in &options.paths {
            sources.extend(parser.parse(path)?);
        }

        let storage = Arc::new(Storage::new());
        let mut ids = IdGenerator::new();
        let mut features: Vec<Arc<Feature>> = Vec::with_capacity(sources.len());
        let mut pickles: Vec<Arc<Pickle>> = Vec::new();
        for source in sources {
            let feature = Arc::new(
                compile(source.uri, source.document, source.source, &mut ids)
                    .map_err(Error::Expand)?,
            );
            storage.insert_feature(Arc::clone(&feature));
            for pickle in &feature.pickles {
                let selected = options
                    .tags
                    .as_ref()
                    .map_or(true, |expr| expr.eval(&pickle.tags));
                if selected {
                    storage.insert_pickle(Arc::clone(pickle));
                    pickles.push(Arc::clone(pickle));
                }
            }
            features.push(feature);
        }

        let mut formatter = match self.formatter_override.take() {
            Some(formatter) => formatter,
            None => {
                let out = options
                    .output
                    .take()
                    .unwrap_or_else(|| Box::new(io::stdout()));
                self.formatters.create(
                    &options.format,
                    out,
                    Config {
                        no_colors: options.no_colors,
                    },
                )?
            }
        };
        if options.concurrency > 1 && !formatter.supports_concurrency() {
            return Err(Error::UnsupportedConcurrency {
                format: options.format.clone(),
                concurrency: options.concurrency,
            });
        }
        formatter.set_storage(Arc::clone(&storage));

        let (selected, seed) = runner::select(pickles, options.shard, options.randomize);
        if let Some(seed) = seed {
            storage.set_seed(seed);
        }

        storage.start();
        let formatter = Mutex::new(formatter);
        {
            let mut fmt = exec::lock(&formatter);
            fmt.test_run_started();
            for feature in &features {
                fmt.feature(feature);
            }
        }

        let _trap = trap::activate();
        let base = Context::new();
        let base = match options.cancel.take() {
            Some(token) => base.with_cancellation(token),
            None => base,
        };
        let (base, suite_failure) = self.hooks.run_before_suite(base);

        let pickle_runner = PickleRunner::new(
            &self.registry,
            &self.hooks,
            &storage,
            &formatter,
            options.max_retries,
        );
        if suite_failure.is_some() {
            // Nothing may execute after a failed suite setup, but the
            // skips still have to be reported and cleanup still runs.
            for pickle in &selected {
                pickle_runner.skip(pickle);
            }
        } else {
            Scheduler {
                concurrency: options.concurrency,
                stop_on_failure: options.stop_on_failure,
            }
            .run(&selected, &pickle_runner, &base);
        }

        let (_, after_failure) = self.hooks.run_after_suite(base);

        exec::lock(&formatter).summary();

        let results = storage.pickle_results();
        let failed = suite_failure.is_some()
            || after_failure.is_some()
            || results.iter().any(|r| r.status == Status::Failed);
        let strict_failure = options.strict
            && results
                .iter()
                .any(|r| matches!(r.status, Status::Pending | Status::Undefined));
        Ok(if failed || strict_failure {
            ExitStatus::Failed
        } else {
            ExitStatus::Passed
        })
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("definitions", &self.registry.len())
            .field("hooks", &self.hooks)
            .field("formatters", &self.formatters)
            .field("options", &self.options)
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}
