//! End-to-end engine behavior through the public [`Suite`] API.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use cornichon::{
    Context, ExitStatus, Failure, Formatter, Pickle, PickleStep, Status, Storage, Suite,
};

/// Formatter recording every callback as one line, for asserting causal
/// order. Also captures the run's [`Storage`] for post-run queries.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    storage: Arc<Mutex<Option<Arc<Storage>>>>,
}

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn storage(&self) -> Arc<Storage> {
        self.storage
            .lock()
            .unwrap()
            .clone()
            .expect("storage must be injected before the run")
    }
}

impl Formatter for Recorder {
    fn test_run_started(&mut self) {
        self.push("started");
    }

    fn pickle(&mut self, pickle: &Pickle) {
        self.push(format!("pickle:{}", pickle.name));
    }

    fn defined(
        &mut self,
        _: &Pickle,
        step: &PickleStep,
        definition: Option<&cornichon::step::Definition>,
    ) {
        self.push(format!(
            "defined:{}:{}",
            step.text,
            if definition.is_some() { "yes" } else { "no" },
        ));
    }

    fn passed(&mut self, _: &Pickle, step: &PickleStep) {
        self.push(format!("passed:{}", step.text));
    }

    fn skipped(&mut self, _: &Pickle, step: &PickleStep) {
        self.push(format!("skipped:{}", step.text));
    }

    fn undefined(&mut self, _: &Pickle, step: &PickleStep) {
        self.push(format!("undefined:{}", step.text));
    }

    fn pending(&mut self, _: &Pickle, step: &PickleStep) {
        self.push(format!("pending:{}", step.text));
    }

    fn failed(&mut self, _: &Pickle, step: &PickleStep, failure: &Failure) {
        self.push(format!("failed:{}:{failure}", step.text));
    }

    fn ambiguous(&mut self, _: &Pickle, step: &PickleStep, _: &cornichon::AmbiguousMatch) {
        self.push(format!("ambiguous:{}", step.text));
    }

    fn summary(&mut self) {
        self.push("summary");
    }

    fn set_storage(&mut self, storage: Arc<Storage>) {
        *self.storage.lock().unwrap() = Some(storage);
    }

    fn supports_concurrency(&self) -> bool {
        true
    }
}

fn suite_with(feature: &str) -> (Suite, Recorder) {
    let mut suite = Suite::new();
    suite
        .feature("inline.feature", feature)
        .expect("fixture feature must parse");
    let recorder = Recorder::default();
    suite.with_formatter(recorder.clone());
    (suite, recorder)
}

#[test]
fn passing_scenario_reports_in_causal_order_and_exits_zero() {
    let (mut suite, recorder) = suite_with(
        "Feature: smoke\n  Scenario: single\n    Given passing step\n",
    );
    suite.step(r"^passing step$", || ());

    let status = suite.run();

    assert_eq!(status, ExitStatus::Passed);
    assert_eq!(status.code(), 0);
    assert_eq!(
        recorder.events(),
        vec![
            "started",
            "pickle:single",
            "defined:passing step:yes",
            "passed:passing step",
            "summary",
        ],
    );
}

#[test]
fn undefined_step_fails_only_in_strict_mode() {
    for (strict, expected) in [(false, ExitStatus::Passed), (true, ExitStatus::Failed)] {
        let (mut suite, recorder) = suite_with(
            "Feature: smoke\n  Scenario: missing\n    When custom action\n",
        );
        suite.options_mut().strict = strict;

        let status = suite.run();

        assert_eq!(status, expected, "strict = {strict}");
        assert!(recorder
            .events()
            .contains(&"undefined:custom action".to_owned()));
        let results = recorder.storage().pickle_results();
        assert_eq!(results[0].status, Status::Undefined);
    }
}

#[test]
fn ambiguous_match_fails_regardless_of_strict() {
    for strict in [false, true] {
        let (mut suite, recorder) = suite_with(
            "Feature: smoke\n  Scenario: overlap\n    When a very ambiguous step\n",
        );
        suite
            .step(r"^.*ambiguous step$", || ())
            .step(r"^..*ambiguous step$", || ());
        suite.options_mut().strict = strict;

        let status = suite.run();

        assert_eq!(status, ExitStatus::Failed, "strict = {strict}");
        assert!(recorder
            .events()
            .contains(&"ambiguous:a very ambiguous step".to_owned()));

        let storage = recorder.storage();
        let results = storage.pickle_results();
        assert_eq!(results[0].status, Status::Failed);
        let steps = storage.step_results_of(results[0].pickle_id);
        assert_eq!(steps[0].status, Status::Ambiguous);
    }
}

#[test]
fn retryable_failure_passes_within_budget_with_attempts_recorded() {
    let (mut suite, recorder) = suite_with(
        "Feature: flaky\n  Scenario: transient\n    Given flaky backend\n",
    );
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    suite.step(r"^flaky backend$", move || {
        let attempt = seen.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            return Err(Failure::retryable(Failure::msg("connection reset")));
        }
        Ok(())
    });
    suite.options_mut().max_retries = 3;

    let status = suite.run();

    assert_eq!(status, ExitStatus::Passed);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let storage = recorder.storage();
    let results = storage.pickle_results();
    assert_eq!(results[0].status, Status::Passed);
    assert_eq!(results[0].attempts, 3);
    // No residual failed step records: the current projection reflects
    // the final attempt only.
    assert!(storage.steps_with_status(Status::Failed).is_empty());
    // The formatter never saw the abandoned attempts.
    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|e| e.starts_with("failed:") || e.starts_with("passed:"))
            .count(),
        1,
    );
}

#[test]
fn retry_budget_exhaustion_reports_the_failure() {
    let (mut suite, recorder) = suite_with(
        "Feature: flaky\n  Scenario: hopeless\n    Given flaky backend\n",
    );
    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&runs);
    suite.step(r"^flaky backend$", move || -> Result<(), Failure> {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(Failure::retryable(Failure::msg("connection reset")))
    });
    suite.options_mut().max_retries = 2;

    let status = suite.run();

    // Two retries on top of the initial run make three attempts.
    assert_eq!(status, ExitStatus::Failed);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    let results = recorder.storage().pickle_results();
    assert_eq!(results[0].status, Status::Failed);
    assert_eq!(results[0].attempts, 3);
}

#[test]
fn single_retry_budget_allows_one_reattempt() {
    let (mut suite, recorder) = suite_with(
        "Feature: flaky\n  Scenario: second try\n    Given flaky backend\n",
    );
    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&runs);
    suite.step(r"^flaky backend$", move || {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(Failure::retryable(Failure::msg("connection reset")));
        }
        Ok(())
    });
    suite.options_mut().max_retries = 1;

    let status = suite.run();

    assert_eq!(status, ExitStatus::Passed);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    let results = recorder.storage().pickle_results();
    assert_eq!(results[0].status, Status::Passed);
    assert_eq!(results[0].attempts, 2);
}

#[test]
fn first_non_passed_step_short_circuits_the_rest() {
    let (mut suite, recorder) = suite_with(
        "Feature: basket\n  Scenario: chain\n    \
         Given a full basket\n    \
         When the basket tips over\n    \
         Then the basket is empty\n",
    );
    suite
        .step(r"^a full basket$", || ())
        .step(r"^the basket tips over$", || -> Result<(), Failure> {
            Err("cukes everywhere".into())
        })
        .step(r"^the basket is empty$", || ());

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    let events = recorder.events();
    assert!(events.contains(&"passed:a full basket".to_owned()));
    assert!(events
        .iter()
        .any(|e| e.starts_with("failed:the basket tips over")));
    assert!(events.contains(&"skipped:the basket is empty".to_owned()));

    // Tally: every step of the pickle has exactly one current record.
    let storage = recorder.storage();
    let results = storage.pickle_results();
    let steps = storage.step_results_of(results[0].pickle_id);
    assert_eq!(steps.len(), 3);
    assert_eq!(
        steps.iter().map(|s| s.status).collect::<Vec<_>>(),
        vec![Status::Passed, Status::Failed, Status::Skipped],
    );
}

#[test]
fn step_hooks_fire_around_skipped_bodies() {
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let (mut suite, recorder) = suite_with(
        "Feature: basket\n  Scenario: chain\n    \
         Given the basket tips over\n    Then the basket is empty\n",
    );
    suite
        .step(r"^the basket tips over$", || -> Result<(), Failure> {
            Err("cukes everywhere".into())
        })
        .step(r"^the basket is empty$", || ());
    let b = Arc::clone(&before);
    suite.before_step(move |ctx, _| {
        b.fetch_add(1, Ordering::SeqCst);
        Ok(ctx)
    });
    let a = Arc::clone(&after);
    suite.after_step(move |ctx, _| {
        a.fetch_add(1, Ordering::SeqCst);
        Ok(ctx)
    });

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    assert!(recorder
        .events()
        .contains(&"skipped:the basket is empty".to_owned()));
    // The second step's body never ran, but its hooks still fired.
    assert_eq!(before.load(Ordering::SeqCst), 2);
    assert_eq!(after.load(Ordering::SeqCst), 2);
}

#[test]
fn pending_step_skips_the_rest_and_respects_strict() {
    let (mut suite, recorder) = suite_with(
        "Feature: wip\n  Scenario: unfinished\n    \
         Given an unfinished step\n    Then never reached\n",
    );
    suite
        .step(r"^an unfinished step$", || -> Result<(), Failure> {
            Err(Failure::pending())
        })
        .step(r"^never reached$", || ());

    let status = suite.run();

    assert_eq!(status, ExitStatus::Passed);
    let storage = recorder.storage();
    let results = storage.pickle_results();
    assert_eq!(results[0].status, Status::Pending);
    let steps = storage.step_results_of(results[0].pickle_id);
    assert_eq!(steps[1].status, Status::Skipped);
}

#[test]
fn panicking_step_fails_without_killing_the_run() {
    let (mut suite, recorder) = suite_with(
        "Feature: explosive\n\
         \n  Scenario: boom\n    Given an exploding step\n\
         \n  Scenario: calm\n    Given passing step\n",
    );
    suite
        .step(r"^an exploding step$", || -> () { panic!("basket exploded") })
        .step(r"^passing step$", || ());

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    let events = recorder.events();
    assert!(events
        .iter()
        .any(|e| e.starts_with("failed:an exploding step") && e.contains("basket exploded")));
    // The second scenario still ran.
    assert!(events.contains(&"passed:passing step".to_owned()));
}

#[test]
fn hooks_run_in_documented_order_and_thread_context() {
    let order = Arc::new(Mutex::new(Vec::<String>::new()));
    let log = |order: &Arc<Mutex<Vec<String>>>, label: &'static str| {
        let order = Arc::clone(order);
        move || order.lock().unwrap().push(label.to_owned())
    };

    let (mut suite, _) = suite_with(
        "Feature: hooks\n  Scenario: observed\n    Given a noted step\n",
    );
    let l = log(&order, "before_suite");
    suite.before_suite(move |ctx| {
        l();
        Ok(ctx.with("seeded", 1_i32))
    });
    let l = log(&order, "before_scenario");
    suite.before_scenario(move |ctx, _| {
        l();
        Ok(ctx)
    });
    let l = log(&order, "before_step");
    suite.before_step(move |ctx, _| {
        l();
        Ok(ctx)
    });
    let l = log(&order, "step");
    suite.step(r"^a noted step$", move |ctx: Context| {
        assert_eq!(ctx.get::<i32>("seeded"), Some(&1));
        l();
    });
    let l = log(&order, "after_step");
    suite.after_step(move |ctx, _| {
        l();
        Ok(ctx)
    });
    let l = log(&order, "after_scenario");
    suite.after_scenario(move |ctx, _| {
        l();
        Ok(ctx)
    });
    let l = log(&order, "after_suite");
    suite.after_suite(move |ctx| {
        l();
        Ok(ctx)
    });

    assert_eq!(suite.run(), ExitStatus::Passed);
    assert_eq!(
        *order.lock().unwrap(),
        vec![
            "before_suite",
            "before_scenario",
            "before_step",
            "step",
            "after_step",
            "after_scenario",
            "after_suite",
        ],
    );
}

#[test]
fn failing_before_scenario_hook_skips_steps_but_cleanup_runs() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleaned);

    let (mut suite, recorder) = suite_with(
        "Feature: hooks\n  Scenario: doomed\n    Given passing step\n",
    );
    suite.step(r"^passing step$", || ());
    suite.before_scenario(|_, _| Err("no database".into()));
    suite.after_scenario(move |ctx, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ctx)
    });

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    let events = recorder.events();
    assert!(events.contains(&"skipped:passing step".to_owned()));
    let results = recorder.storage().pickle_results();
    assert_eq!(results[0].status, Status::Failed);
    assert_eq!(
        results[0].error.as_ref().map(ToString::to_string),
        Some("no database".to_owned()),
    );
}

#[test]
fn nested_steps_execute_in_place() {
    let (mut suite, recorder) = suite_with(
        "Feature: macros\n  Scenario: composite\n    Given a prepared basket\n",
    );
    suite
        .step(r"^a prepared basket$", || {
            vec![
                "an empty basket".to_owned(),
                "5 cukes are added".to_owned(),
            ]
        })
        .step(r"^an empty basket$", |ctx: Context| ctx.with("cukes", 0_i64))
        .step(r"^(\d+) cukes are added$", |ctx: Context, n: i64| {
            let have = ctx.get::<i64>("cukes").copied().unwrap_or_default();
            ctx.with("cukes", have + n)
        });

    let status = suite.run();

    assert_eq!(status, ExitStatus::Passed);
    assert!(recorder
        .events()
        .contains(&"passed:a prepared basket".to_owned()));
}

#[test]
fn undefined_nested_step_fails_the_parent_descriptively() {
    let (mut suite, recorder) = suite_with(
        "Feature: macros\n  Scenario: broken\n    Given a prepared basket\n",
    );
    suite.step(r"^a prepared basket$", || {
        vec!["a step nobody wrote".to_owned()]
    });

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    assert!(recorder.events().iter().any(|e| {
        e.starts_with("failed:a prepared basket")
            && e.contains("undefined nested step `a step nobody wrote`")
    }));
}

#[test]
fn nested_step_needing_structured_input_fails_the_parent() {
    let (mut suite, recorder) = suite_with(
        "Feature: macros\n  Scenario: composite\n    Given a prepared basket\n",
    );
    suite
        .step(r"^a prepared basket$", || vec!["the stock:".to_owned()])
        .step(r"^the stock:$", |_: cornichon::Table| ());

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    assert!(recorder.events().iter().any(|e| {
        e.starts_with("failed:a prepared basket")
            && e.contains("doc string or data table")
    }));
}

#[test]
fn conversion_failure_is_the_steps_failure_cause() {
    let (mut suite, recorder) = suite_with(
        "Feature: basket\n  Scenario: tiny\n    Given I eat 300 cukes\n",
    );
    suite.step(r"^I eat (\d+) cukes$", |_: i8| ());

    let status = suite.run();

    assert_eq!(status, ExitStatus::Failed);
    assert!(recorder
        .events()
        .iter()
        .any(|e| e.contains("cannot convert `300` into `i8`")));
}

#[test]
fn doc_strings_and_tables_bind_to_trailing_params() {
    let (mut suite, _) = suite_with(
        "Feature: data\n  Scenario: stocked\n    \
         Given the note:\n      \"\"\"\n      remember the cukes\n      \"\"\"\n    \
         And the stock:\n      | fruit | count |\n      | cuke  | 5     |\n",
    );
    suite
        .step(r"^the note:$", |note: cornichon::DocString| {
            assert!(note.contains("remember the cukes"));
        })
        .step(r"^the stock:$", |stock: cornichon::Table| {
            let rows = stock.hashes();
            assert_eq!(rows[0]["fruit"], "cuke");
            assert_eq!(rows[0]["count"], "5");
        });

    assert_eq!(suite.run(), ExitStatus::Passed);
}

#[test]
fn definitions_listing_shows_pattern_and_registration_site() {
    let mut suite = Suite::new();
    suite
        .step(r"^passing step$", || ())
        .step(r"^I eat (\d+) cukes$", |_: i64| ());

    let mut out = Vec::new();
    suite.write_definitions(&mut out).unwrap();

    let listing = String::from_utf8(out).unwrap();
    let lines: Vec<_> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("^passing step$ # "));
    assert!(lines[0].contains("engine.rs:"));
    assert!(lines[1].starts_with(r"^I eat (\d+) cukes$ # "));
}

#[test]
fn tally_covers_every_step_exactly_once() {
    let (mut suite, recorder) = suite_with(
        "Feature: tally\n\
         \n  Scenario: a\n    Given passing step\n    And passing step\n\
         \n  Scenario: b\n    Given failing step\n    And passing step\n\
         \n  Scenario: c\n    Given mystery step\n",
    );
    suite
        .step(r"^passing step$", || ())
        .step(r"^failing step$", || -> Result<(), Failure> {
            Err("nope".into())
        });

    suite.run();

    let storage = recorder.storage();
    let total: usize = storage
        .pickle_results()
        .iter()
        .map(|r| storage.step_results_of(r.pickle_id).len())
        .sum();
    assert_eq!(total, 5);
    let by_status: usize = [
        Status::Passed,
        Status::Failed,
        Status::Skipped,
        Status::Undefined,
        Status::Pending,
        Status::Ambiguous,
    ]
    .iter()
    .map(|s| storage.steps_with_status(*s).len())
    .sum();
    assert_eq!(by_status, 5);
}
