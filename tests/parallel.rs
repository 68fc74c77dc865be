//! Parallel runner behavior through the public harness surface.
//!
//! These runs enable the worker pool and lean on the completion tree: the
//! drain must not return until every task, including sub-tests submitted by
//! tasks that are already running, has finished and attached its results.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use lumentest::report::{visit_failed_sets, visit_sets};
use lumentest::{req, sub, Config, Harness, HarnessError, ResultNode, TestHandle};

fn parallel_quiet(config: &mut Config, _args: &[String]) -> Result<(), HarnessError> {
    config.output = false;
    config.parallel = true;
    config.parallel_subs = true;
    config.threads = 4;
    Ok(())
}

fn run_parallel(tests: &[(&'static str, fn(&mut TestHandle))]) -> lumentest::RunReport {
    let mut harness = Harness::with_args(vec!["harness".into()]);
    harness.add_config("parallel_quiet", parallel_quiet);
    for (name, action) in tests {
        harness.add_test(name, *action);
    }
    harness.execute().expect("setup must succeed")
}

fn spawner(t: &mut TestHandle) {
    sub!(t, First, |t| {
        req!(t, 1, ==, 1);
        // Linger so the grandchild is submitted well after the drain began.
        thread::sleep(Duration::from_millis(30));
        sub!(t, Grandchild, |t| {
            thread::sleep(Duration::from_millis(40));
            req!(t, 2, ==, 2);
        });
    });
    sub!(t, Second, |t| {
        req!(t, 3, ==, 3);
    });
}

#[test]
fn drain_waits_for_tasks_spawned_at_runtime() {
    let report = run_parallel(&[("spawner", spawner)]);
    let root = &report.results;

    assert!(!root.failed());
    assert_eq!(root.child_count(), 1);

    let mut names = BTreeSet::new();
    visit_sets(root, &mut |set| {
        names.insert(set.name());
    });
    assert_eq!(
        names,
        BTreeSet::from(["spawner", "First", "Second", "Grandchild"])
    );

    // Depth survives the cell-tree freeze.
    visit_sets(root, &mut |set| match set.name() {
        "spawner" => assert_eq!(set.depth(), 1),
        "First" | "Second" => assert_eq!(set.depth(), 2),
        "Grandchild" => assert_eq!(set.depth(), 3),
        other => panic!("unexpected set {other}"),
    });
}

fn deep_failure(t: &mut TestHandle) {
    sub!(t, Outer, |t| {
        req!(t, 1, ==, 1);
        sub!(t, Inner, |t| {
            req!(t, 1, ==, 2);
        });
    });
}

#[test]
fn failure_aggregates_across_worker_boundaries() {
    let report = run_parallel(&[("deep_failure", deep_failure)]);
    let root = &report.results;

    assert!(root.failed());
    let mut failed = Vec::new();
    visit_failed_sets(root, &mut |set| failed.push(set.name()));
    assert_eq!(failed, ["deep_failure", "Outer", "Inner"]);
}

fn panics_on_worker(_t: &mut TestHandle) {
    panic!("worker down");
}

fn healthy(t: &mut TestHandle) {
    req!(t, "fine", ==, "fine");
}

#[test]
fn worker_panic_is_caught_per_task() {
    let report = run_parallel(&[("panics_on_worker", panics_on_worker), ("healthy", healthy)]);
    let root = &report.results;

    assert!(root.failed());
    assert_eq!(root.child_count(), 2);
    for node in root.children() {
        let ResultNode::Set(set) = node else {
            panic!("global children must be sets");
        };
        match set.name() {
            "panics_on_worker" => {
                assert!(set.failed());
                assert_eq!(set.child_count(), 1);
                let Some(ResultNode::UncaughtError(err)) = set.children().next() else {
                    panic!("expected exactly one uncaught error leaf");
                };
                assert_eq!(err.message(), "worker down");
            }
            "healthy" => assert!(!set.failed()),
            other => panic!("unexpected set {other}"),
        }
    }
}

#[test]
fn empty_parallel_run_drains_immediately() {
    let report = run_parallel(&[]);
    assert!(!report.failed());
    assert_eq!(report.results.child_count(), 0);
}

fn inline_subs(t: &mut TestHandle) {
    sub!(t, Inline, |t| {
        req!(t, 10, >, 9);
    });
}

#[test]
fn global_parallelism_with_synchronous_subs() {
    fn global_only(config: &mut Config, _args: &[String]) -> Result<(), HarnessError> {
        config.output = false;
        config.parallel = true;
        config.parallel_subs = false;
        config.threads = 2;
        Ok(())
    }

    let mut harness = Harness::with_args(vec!["harness".into()]);
    harness.add_config("global_only", global_only);
    harness.add_test("inline_subs", inline_subs);
    let report = harness.execute().expect("setup must succeed");
    let root = &report.results;

    assert!(!root.failed());
    let Some(ResultNode::Set(outer)) = root.children().next() else {
        panic!("missing the global test");
    };
    let Some(ResultNode::Set(inline)) = outer.children().next() else {
        panic!("sub-test should have run inline on the worker");
    };
    assert_eq!(inline.name(), "Inline");
    assert_eq!(inline.depth(), 2);
}
