// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scheduling of pickles onto workers.

pub(crate) mod exec;
pub(crate) mod trap;

use std::{
    collections::VecDeque,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

use derive_more::{Display, Error};
use rand::{rngs::StdRng, seq::SliceRandom as _, SeedableRng as _};

use crate::{pickle::Pickle, result::Status, Context};

pub(crate) use self::exec::PickleRunner;

/// Partition of the pickle list across external worker nodes: pickle with
/// input index `i` belongs to this shard iff `i % modulus == target`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Shard {
    pub target: usize,
    pub modulus: usize,
}

impl Shard {
    pub(crate) fn contains(&self, index: usize) -> bool {
        index % self.modulus == self.target
    }
}

impl std::fmt::Display for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.target, self.modulus)
    }
}

/// Malformed `target/modulus` shard specification.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display("invalid shard `{_0}`, expected `target/modulus` with target < modulus")]
pub struct ParseShardError(#[error(not(source))] pub String);

impl FromStr for Shard {
    type Err = ParseShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseShardError(s.to_owned());
        let (target, modulus) = s.split_once('/').ok_or_else(err)?;
        let target = target.trim().parse().map_err(|_| err())?;
        let modulus = modulus.trim().parse().map_err(|_| err())?;
        if modulus == 0 || target >= modulus {
            return Err(err());
        }
        Ok(Self { target, modulus })
    }
}

/// Applies shard filtering and the seeded shuffle to the input pickle
/// list, returning the execution order plus the effective seed (if any).
///
/// The shard filter runs first, on input-list indices, so external worker
/// nodes agree on the partition regardless of their local shuffle seeds.
/// `randomize`: `0` keeps list order, `-1` derives a seed from the clock,
/// anything else is used as the seed verbatim.
pub(crate) fn select(
    pickles: Vec<Arc<Pickle>>,
    shard: Option<Shard>,
    randomize: i64,
) -> (Vec<Arc<Pickle>>, Option<u64>) {
    let mut pickles: Vec<_> = match shard {
        Some(shard) => pickles
            .into_iter()
            .enumerate()
            .filter(|(i, _)| shard.contains(*i))
            .map(|(_, p)| p)
            .collect(),
        None => pickles,
    };

    let seed = match randomize {
        0 => None,
        -1 => Some(auto_seed()),
        fixed => Some(fixed as u64),
    };
    if let Some(seed) = seed {
        pickles.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    (pickles, seed)
}

fn auto_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Drives pickles through a [`PickleRunner`], sequentially or on a
/// bounded pool of OS threads.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Scheduler {
    pub(crate) concurrency: usize,
    pub(crate) stop_on_failure: bool,
}

impl Scheduler {
    /// Runs all `pickles` to completion.
    ///
    /// With concurrency above one, workers pull from a shared queue;
    /// a failing pickle (under stop-on-failure) flips a shared flag that
    /// gates the *start* of every later pickle; in-flight ones finish,
    /// gated ones are recorded as skipped. Retries happen inside
    /// [`PickleRunner::run`] on the same worker and never requeue.
    pub(crate) fn run(&self, pickles: &[Arc<Pickle>], runner: &PickleRunner<'_>, base: &Context) {
        let stop = AtomicBool::new(false);

        if self.concurrency <= 1 {
            for pickle in pickles {
                self.dispatch(pickle, runner, base, &stop);
            }
            return;
        }

        let queue: Mutex<VecDeque<&Arc<Pickle>>> = Mutex::new(pickles.iter().collect());
        thread::scope(|scope| {
            for _ in 0..self.concurrency {
                scope.spawn(|| loop {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some(pickle) = next else {
                        break;
                    };
                    self.dispatch(pickle, runner, base, &stop);
                });
            }
        });
    }

    fn dispatch(
        &self,
        pickle: &Arc<Pickle>,
        runner: &PickleRunner<'_>,
        base: &Context,
        stop: &AtomicBool,
    ) {
        if self.stop_on_failure && stop.load(Ordering::SeqCst) {
            runner.skip(pickle);
            return;
        }
        if runner.run(pickle, base) == Status::Failed {
            stop.store(true, Ordering::SeqCst);
        }
    }
}
