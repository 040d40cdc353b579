// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution result records.

use std::{sync::Arc, time::Duration};

use derive_more::Display;

use crate::{
    error::Failure,
    pickle::{PickleId, StepId},
    step::Definition,
};

/// Terminal status of a pickle or a step.
///
/// `Retry` never appears here: retryable failures are resolved by the
/// runner before any result becomes final.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Status {
    #[display("passed")]
    Passed,
    #[display("failed")]
    Failed,
    #[display("skipped")]
    Skipped,
    #[display("undefined")]
    Undefined,
    #[display("pending")]
    Pending,
    #[display("ambiguous")]
    Ambiguous,
}

impl Status {
    /// Statuses in summary display order.
    pub(crate) const ALL: [Self; 6] = [
        Self::Passed,
        Self::Failed,
        Self::Pending,
        Self::Undefined,
        Self::Ambiguous,
        Self::Skipped,
    ];
}

/// Result of the latest attempt of one step.
#[derive(Clone, Debug)]
pub struct StepResult {
    pub step_id: StepId,
    pub pickle_id: PickleId,
    pub status: Status,

    /// Matched definition, if the text resolved uniquely.
    pub definition: Option<Arc<Definition>>,

    /// Failure cause for `Failed`/`Ambiguous` steps.
    pub error: Option<Arc<Failure>>,

    /// 1-based attempt this result was produced in.
    pub attempt: usize,

    pub duration: Duration,
}

/// Result of one pickle, reflecting its latest attempt.
#[derive(Clone, Debug)]
pub struct PickleResult {
    pub pickle_id: PickleId,
    pub status: Status,

    /// Scenario-level failure cause: the first failed step's error, or a
    /// hook failure when no step failed.
    pub error: Option<Arc<Failure>>,

    /// Total attempts executed (1 when no retry happened).
    pub attempts: usize,

    pub duration: Duration,
}
