// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step failures and suite-level configuration errors.

use std::fmt;

use derive_more::Display;

use crate::feature::ExpandError;

/// Failure raised by a step body or a hook.
///
/// Wraps an [`anyhow::Error`] payload, so handlers may bubble anything
/// convertible into one with `?`. Two special flavors exist:
/// [`Failure::pending()`] marks a step as acknowledged-but-unimplemented,
/// and [`Failure::retryable()`] asks the runner to re-attempt the whole
/// scenario (subject to its retry budget) instead of failing it outright.
pub struct Failure {
    kind: FailureKind,
    error: anyhow::Error,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FailureKind {
    /// Plain failure.
    Error,

    /// Step is acknowledged but not yet implemented.
    Pending,

    /// Transient failure eligible for a scenario re-attempt.
    Retryable,
}

impl Failure {
    /// Wraps any [`std::error::Error`] into a plain [`Failure`].
    #[must_use]
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: FailureKind::Error,
            error: anyhow::Error::new(error),
        }
    }

    /// Creates a plain [`Failure`] from a display-able message.
    #[must_use]
    pub fn msg(msg: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::Error,
            error: anyhow::Error::msg(msg.to_string()),
        }
    }

    /// Marks the step as pending implementation.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            kind: FailureKind::Pending,
            error: anyhow::Error::msg("step implementation is pending"),
        }
    }

    /// Wraps a failure so the runner re-attempts the scenario, if its retry
    /// budget allows. Once the budget is exhausted the wrapped failure is
    /// reported as a regular one.
    #[must_use]
    pub fn retryable(failure: impl Into<Self>) -> Self {
        Self {
            kind: FailureKind::Retryable,
            error: failure.into().error,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.kind == FailureKind::Pending
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }

    /// Underlying error payload.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:#}` renders the whole `anyhow` chain on one line.
        write!(f, "{:#}", self.error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("error", &self.error)
            .finish()
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Error,
            error,
        }
    }
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Self::msg(msg)
    }
}

impl From<&str> for Failure {
    fn from(msg: &str) -> Self {
        Self::msg(msg)
    }
}

/// Error aborting a run before any scenario executes.
///
/// Maps to exit code 2: the suite was misconfigured, no results were
/// produced.
// The derive is spelled out to keep this type's name free for `Error`.
#[derive(Debug, Display, derive_more::Error)]
pub enum Error {
    /// Requested output format has no registered factory.
    #[display("unknown output format `{_0}`")]
    UnknownFormat(#[error(not(source))] String),

    /// Requested formatter cannot consume a concurrent run.
    #[display(
        "`{format}` formatter does not support concurrent execution \
         (requested concurrency: {concurrency})"
    )]
    UnsupportedConcurrency {
        format: String,
        concurrency: usize,
    },

    /// Feature source failed to parse.
    #[display("failed to parse feature: {_0}")]
    Parse(#[error(not(source))] String),

    /// Scenario outline references an unknown placeholder.
    #[display("failed to expand scenario outline: {_0}")]
    Expand(ExpandError),
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn question_mark_conversions() {
        fn io_step() -> Result<(), Failure> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
                .map_err(Failure::new)?;
            Ok(())
        }

        fn msg_step() -> Result<(), Failure> {
            Err("plain message".into())
        }

        assert_eq!(io_step().unwrap_err().to_string(), "boom");
        assert_eq!(msg_step().unwrap_err().to_string(), "plain message");
    }

    #[test]
    fn retryable_preserves_the_message() {
        let failure = Failure::retryable(Failure::msg("flaky backend"));

        assert!(failure.is_retryable());
        assert!(!failure.is_pending());
        assert_eq!(failure.to_string(), "flaky backend");
    }

    #[test]
    fn pending_is_not_retryable() {
        let failure = Failure::pending();

        assert!(failure.is_pending());
        assert!(!failure.is_retryable());
    }
}
