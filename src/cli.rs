// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI options.

use clap::Parser;
use gherkin::tagexpr::TagOperation;

use crate::{runner::Shard, suite::Options};

/// Command-line options, mapping one-to-one onto [`Options`].
#[derive(Debug, Parser)]
#[command(name = "cornichon", about = "Runs Gherkin scenarios", version)]
pub struct Opts {
    /// Output format.
    #[arg(long, short, value_name = "name", default_value = "progress")]
    pub format: String,

    /// Scenarios are run only if their tags match the given expression,
    /// e.g. `@smoke and not @slow`.
    #[arg(long, short, value_name = "tagexpr", verbatim_doc_comment)]
    pub tags: Option<TagOperation>,

    /// Number of scenarios to run concurrently.
    #[arg(long, short, value_name = "int", default_value_t = 1)]
    pub concurrency: usize,

    /// Fail the run on pending or undefined steps.
    #[arg(long)]
    pub strict: bool,

    /// Stop scheduling new scenarios after the first failure.
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Disable terminal colors.
    #[arg(long)]
    pub no_colors: bool,

    /// Shuffle scenario execution order: 0 keeps document order, -1
    /// derives a seed from the clock, anything else is the seed.
    #[arg(
        long,
        value_name = "seed",
        default_value_t = 0,
        allow_hyphen_values = true
    )]
    pub random: i64,

    /// Run only this shard of the scenario list, as `target/modulus`.
    #[arg(long, value_name = "target/modulus")]
    pub shard: Option<Shard>,

    /// Re-attempts per scenario on retryable failures.
    #[arg(long, value_name = "int", default_value_t = 0)]
    pub retry: usize,

    /// List registered step definitions and exit.
    #[arg(long)]
    pub definitions: bool,

    /// Feature files or directories to run.
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,
}

impl Opts {
    /// Parses the process arguments.
    #[must_use]
    pub fn parsed() -> Self {
        Self::parse()
    }

    /// Lowers the CLI options into suite [`Options`].
    #[must_use]
    pub fn into_options(self) -> Options {
        Options {
            format: self.format,
            tags: self.tags,
            concurrency: self.concurrency,
            strict: self.strict,
            stop_on_failure: self.stop_on_failure,
            no_colors: self.no_colors,
            randomize: self.random,
            paths: self.paths,
            shard: self.shard,
            max_retries: self.retry,
            definitions: self.definitions,
            ..Options::default()
        }
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    fn parse(args: &[&str]) -> Opts {
        Opts::try_parse_from(std::iter::once("cornichon").chain(args.iter().copied()))
            .unwrap_or_else(|e| panic!("args must parse: {e}"))
    }

    #[test]
    fn defaults_mirror_suite_defaults() {
        let options = parse(&[]).into_options();
        let defaults = Options::default();

        assert_eq!(options.format, defaults.format);
        assert_eq!(options.concurrency, defaults.concurrency);
        assert_eq!(options.strict, defaults.strict);
        assert_eq!(options.randomize, defaults.randomize);
        assert_eq!(options.max_retries, defaults.max_retries);
    }

    #[test]
    fn definitions_flag_lowers_into_options() {
        let options = parse(&["--definitions"]).into_options();

        assert!(options.definitions);
        assert!(!parse(&[]).into_options().definitions);
    }

    #[test]
    fn negative_random_seed_is_accepted() {
        let opts = parse(&["--random", "-1"]);

        assert_eq!(opts.random, -1);
    }

    #[test]
    fn shard_and_paths_round_trip() {
        let opts = parse(&["--shard", "1/3", "features/", "more.feature"]);

        assert_eq!(
            opts.shard,
            Some(Shard {
                target: 1,
                modulus: 3,
            }),
        );
        assert_eq!(opts.paths, vec!["features/", "more.feature"]);
    }

    #[test]
    fn tag_expression_parses() {
        let opts = parse(&["--tags", "@fast and not @wip"]);

        assert!(opts.tags.is_some());
    }
}
