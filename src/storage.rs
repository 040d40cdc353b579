// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Thread-safe, order-preserving result [`Storage`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use linked_hash_map::LinkedHashMap;

use crate::{
    feature::Feature,
    pickle::{Pickle, PickleId, PickleStep, StepId},
    result::{PickleResult, Status, StepResult},
};

/// Shared store of everything a run produces.
///
/// One coarse [`Mutex`] guards all maps: write bursts are tiny (a handful
/// of inserts per step) and reads dominate only after the run, so finer
/// locking buys nothing. Pickles are indexed in input-list order, which
/// makes every summary query order-stable no matter which worker finished
/// first.
///
/// Lookups of keys that were never registered panic: results can only
/// arrive for pickles the suite itself inserted, so a missing key is a
/// wiring bug, not a runtime condition.
#[derive(Debug, Default)]
pub struct Storage {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    features: LinkedHashMap<String, Arc<Feature>>,
    pickles: LinkedHashMap<PickleId, Arc<Pickle>>,
    steps: HashMap<StepId, PickleStep>,
    step_order: HashMap<PickleId, Vec<StepId>>,
    pickle_results: HashMap<PickleId, PickleResult>,
    step_results: HashMap<StepId, StepResult>,
    started_at: Option<Instant>,
    seed: Option<u64>,
}

impl Storage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the `TestRunStarted` instant. First call wins.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.started_at.is_none() {
            inner.started_at = Some(Instant::now());
        }
    }

    /// Time elapsed since [`Storage::start()`], or zero if the run never
    /// started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.lock()
            .started_at
            .map_or(Duration::ZERO, |at| at.elapsed())
    }

    /// Records the effective shuffle seed for summary display.
    pub fn set_seed(&self, seed: u64) {
        self.lock().seed = Some(seed);
    }

    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.lock().seed
    }

    /// Registers a parsed feature, keyed by URI.
    pub fn insert_feature(&self, feature: Arc<Feature>) {
        self.lock()
            .features
            .insert(feature.uri.clone(), feature);
    }

    /// Registers a pickle and all its steps. Insertion order defines
    /// reporting order.
    pub fn insert_pickle(&self, pickle: Arc<Pickle>) {
        let mut inner = self.lock();
        let order = pickle.steps.iter().map(|s| s.id).collect();
        for step in &pickle.steps {
            inner.steps.insert(step.id, step.clone());
        }
        inner.step_order.insert(pickle.id, order);
        inner.pickles.insert(pickle.id, pickle);
    }

    /// Feature registered under `uri`.
    ///
    /// # Panics
    ///
    /// If no feature with that URI was inserted.
    #[must_use]
    pub fn feature(&self, uri: &str) -> Arc<Feature> {
        self.lock()
            .features
            .get(uri)
            .cloned()
            .unwrap_or_else(|| panic!("no feature registered under `{uri}`"))
    }

    /// # Panics
    ///
    /// If no pickle with this `id` was inserted.
    #[must_use]
    pub fn pickle(&self, id: PickleId) -> Arc<Pickle> {
        self.lock()
            .pickles
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("no pickle registered under id {id}"))
    }

    /// # Panics
    ///
    /// If no step with this `id` was inserted.
    #[must_use]
    pub fn step(&self, id: StepId) -> PickleStep {
        self.lock()
            .steps
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("no step registered under id {id}"))
    }

    /// All features, in insertion order.
    #[must_use]
    pub fn features(&self) -> Vec<Arc<Feature>> {
        self.lock().features.values().cloned().collect()
    }

    /// All pickles, in input-list (= reporting) order.
    #[must_use]
    pub fn pickles(&self) -> Vec<Arc<Pickle>> {
        self.lock().pickles.values().cloned().collect()
    }

    /// Records a step result, superseding the previous attempt's record
    /// for the same step id.
    ///
    /// # Panics
    ///
    /// If the step was never registered.
    pub fn insert_step_result(&self, result: StepResult) {
        let mut inner = self.lock();
        assert!(
            inner.steps.contains_key(&result.step_id),
            "result for unregistered step id {}",
            result.step_id,
        );
        inner.step_results.insert(result.step_id, result);
    }

    /// Records a pickle result, superseding the previous attempt's record
    /// for the same pickle id.
    ///
    /// # Panics
    ///
    /// If the pickle was never registered.
    pub fn insert_pickle_result(&self, result: PickleResult) {
        let mut inner = self.lock();
        assert!(
            inner.pickles.contains_key(&result.pickle_id),
            "result for unregistered pickle id {}",
            result.pickle_id,
        );
        inner.pickle_results.insert(result.pickle_id, result);
    }

    /// Latest result of the given pickle, if it ran.
    #[must_use]
    pub fn pickle_result(&self, id: PickleId) -> Option<PickleResult> {
        self.lock().pickle_results.get(&id).cloned()
    }

    /// Latest result of the given step, if it ran.
    #[must_use]
    pub fn step_result(&self, id: StepId) -> Option<StepResult> {
        self.lock().step_results.get(&id).cloned()
    }

    /// Latest pickle results, in input-list order (not completion order).
    #[must_use]
    pub fn pickle_results(&self) -> Vec<PickleResult> {
        let inner = self.lock();
        inner
            .pickles
            .keys()
            .filter_map(|id| inner.pickle_results.get(id).cloned())
            .collect()
    }

    /// Latest step results of one pickle, in document order.
    ///
    /// # Panics
    ///
    /// If the pickle was never registered.
    #[must_use]
    pub fn step_results_of(&self, pickle: PickleId) -> Vec<StepResult> {
        let inner = self.lock();
        inner
            .step_order
            .get(&pickle)
            .unwrap_or_else(|| panic!("no pickle registered under id {pickle}"))
            .iter()
            .filter_map(|id| inner.step_results.get(id).cloned())
            .collect()
    }

    /// Ids of pickles whose latest result has the given status, in
    /// input-list order.
    #[must_use]
    pub fn pickles_with_status(&self, status: Status) -> Vec<PickleId> {
        let inner = self.lock();
        inner
            .pickles
            .keys()
            .filter(|id| {
                inner
                    .pickle_results
                    .get(id)
                    .is_some_and(|r| r.status == status)
            })
            .copied()
            .collect()
    }

    /// Ids of steps whose latest result has the given status, in
    /// input-list order (pickle order, then document order within each
    /// pickle).
    #[must_use]
    pub fn steps_with_status(&self, status: Status) -> Vec<StepId> {
        let inner = self.lock();
        inner
            .pickles
            .keys()
            .flat_map(|id| inner.step_order.get(id).into_iter().flatten())
            .filter(|id| {
                inner
                    .step_results
                    .get(id)
                    .is_some_and(|r| r.status == status)
            })
            .copied()
            .collect()
    }

    /// Folds another store into this one, preserving the other store's
    /// insertion order after this store's existing entries. Combining the
    /// per-shard stores of a partitioned run yields the same view a single
    /// sequential store would hold.
    pub fn merge(&self, other: Self) {
        let other = other
            .inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut inner = self.lock();
        for (uri, feature) in other.features {
            inner.features.insert(uri, feature);
        }
        for (id, pickle) in other.pickles {
            inner.pickles.insert(id, pickle);
        }
        inner.steps.extend(other.steps);
        inner.step_order.extend(other.step_order);
        inner.pickle_results.extend(other.pickle_results);
        inner.step_results.extend(other.step_results);
        if inner.started_at.is_none() {
            inner.started_at = other.started_at;
        }
        if inner.seed.is_none() {
            inner.seed = other.seed;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
