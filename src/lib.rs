// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! BDD scenario execution engine.
//!
//! `cornichon` parses Gherkin feature documents, compiles them into
//! pickles, matches every step against a registry of regex-keyed typed
//! handlers and executes the result on a bounded worker pool, reporting
//! through pluggable formatters.
//!
//! ```no_run
//! use cornichon::{Context, Failure, Suite};
//!
//! let mut suite = Suite::new();
//! suite
//!     .given(r"^there are (\d+) cukes in the basket$", |ctx: Context, n: i64| {
//!         ctx.with("cukes", n)
//!     })
//!     .when(r"^I eat (\d+) cukes$", |ctx: Context, n: i64| {
//!         let have = ctx.get::<i64>("cukes").copied().unwrap_or(0);
//!         if n > have {
//!             return Err(Failure::msg("not enough cukes"));
//!         }
//!         Ok(ctx.with("cukes", have - n))
//!     })
//!     .then(r"^(\d+) cukes remain$", |ctx: Context, n: i64| {
//!         assert_eq!(ctx.get::<i64>("cukes"), Some(&n));
//!     });
//! suite.options_mut().paths = vec!["tests/features".into()];
//! suite.run().exit();
//! ```

pub mod cli;
pub mod context;
pub mod error;
pub mod feature;
pub mod formatter;
pub mod hook;
pub mod parser;
pub mod pickle;
pub mod result;
pub mod step;
pub mod storage;
pub mod suite;
pub mod tag;

mod runner;

pub use self::{
    context::{CancelToken, Context},
    error::{Error, Failure},
    feature::{Feature, IdGenerator},
    formatter::Formatter,
    hook::Hooks,
    pickle::{DocString, Pickle, PickleStep, StepArgument, Table},
    result::{PickleResult, Status, StepResult},
    runner::{ParseShardError, Shard},
    step::{
        args::Value, AmbiguousMatch, Handler, IntoPattern, Location, Match, ParamType, Pattern,
        Registry,
    },
    storage::Storage,
    suite::{ExitStatus, Options, Suite},
};
