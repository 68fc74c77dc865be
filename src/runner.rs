//! The test execution engine.
//!
//! Each test invocation walks a small state machine: a [`ResultSet`] is
//! created with its level and a start timestamp (*Created*), the body runs
//! with an explicit [`TestHandle`] context (*Running*), a panic is converted
//! into a single [`UncaughtErrorResult`] at the test boundary (*Faulted*),
//! synchronous sub-tests recurse on the calling stack (*Completed*), and
//! finally the set is stamped with its duration and handed to the caller
//! (*Finalized*). Failures never propagate past the test that produced them;
//! ancestors learn about them through aggregation only.
//!
//! Panic capture installs a process-wide hook once (first run wins) that
//! records the panic site into a thread-local while a test body is on the
//! stack and defers to the previous hook otherwise, so panics outside the
//! harness still print normally.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;

use crate::pool::{NodeId, SetCell, ThreadPool};
use crate::results::{ResultNode, ResultSet, SourceLocation, UncaughtErrorResult};

// =============================================================================
// PANIC CAPTURE
// =============================================================================

static HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

thread_local! {
    static IN_TEST_BODY: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC_SITE: RefCell<Option<SourceLocation>> = const { RefCell::new(None) };
}

fn install_panic_hook() {
    HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_TEST_BODY.with(Cell::get) {
                let site = info
                    .location()
                    .map(|loc| SourceLocation::new(loc.file().to_owned(), loc.line()));
                LAST_PANIC_SITE.with(|slot| *slot.borrow_mut() = site);
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run a body with panic capture, converting an escaped panic into the
/// test's single uncaught-error record. The first panic terminates the
/// remaining body, so at most one record per invocation exists.
pub(crate) fn run_guarded(body: impl FnOnce()) -> Option<UncaughtErrorResult> {
    install_panic_hook();
    let was_inside = IN_TEST_BODY.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(body));
    IN_TEST_BODY.with(|flag| flag.set(was_inside));
    match outcome {
        Ok(()) => None,
        Err(payload) => {
            let site = LAST_PANIC_SITE.with(|slot| slot.borrow_mut().take());
            Some(UncaughtErrorResult::new(site, panic_message(payload)))
        }
    }
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

/// The explicit context handed to every test body.
///
/// All recording goes through the handle; there is no hidden global state
/// tying an assertion to its test. In the default mode results accumulate in
/// an owned set on the calling stack; under the parallel runner they go to a
/// shared cell guarded by that cell's own lock.
pub struct TestHandle {
    level: u32,
    mode: Mode,
}

enum Mode {
    Sync {
        set: ResultSet,
    },
    Pooled {
        cell: Arc<SetCell>,
        pool: Arc<ThreadPool>,
        node: NodeId,
    },
}

impl TestHandle {
    pub(crate) fn sync(name: &'static str, level: u32) -> Self {
        Self {
            level,
            mode: Mode::Sync {
                set: ResultSet::new(name, level),
            },
        }
    }

    pub(crate) fn pooled(
        level: u32,
        cell: Arc<SetCell>,
        pool: Arc<ThreadPool>,
        node: NodeId,
    ) -> Self {
        Self {
            level,
            mode: Mode::Pooled { cell, pool, node },
        }
    }

    /// Nesting level of the running test: 1 for global tests.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Attach a finished node to this test's result set.
    pub fn record(&mut self, node: ResultNode) {
        match &mut self.mode {
            Mode::Sync { set } => set.add(node),
            Mode::Pooled { cell, .. } => cell.push_node(node),
        }
    }

    /// Record one assertion evaluation and return whether it passed, so test
    /// code can chain control flow on the outcome. Used by [`req!`].
    ///
    /// [`req!`]: crate::req
    pub fn record_assertion(&mut self, assertion: crate::results::AssertionResult) -> bool {
        let passed = !assertion.failed();
        self.record(ResultNode::Assertion(assertion));
        passed
    }

    /// Run a sub-test against this test's context.
    ///
    /// In the default mode the sub-test executes here, synchronously and
    /// recursively, and its finalized set is attached before the parent
    /// finalizes. Under the parallel runner with sub-test concurrency on,
    /// the body is submitted to the worker pool instead and its results
    /// attach whenever it completes.
    pub fn sub(&mut self, name: &'static str, body: impl FnOnce(&mut TestHandle) + Send + 'static) {
        let level = self.level + 1;
        match &mut self.mode {
            Mode::Sync { set } => {
                let child = run_test(name, level, body);
                set.add(ResultNode::Set(child));
            }
            Mode::Pooled { cell, pool, node } => {
                if pool.parallel_subs() {
                    pool.submit(name, level, *node, Arc::clone(cell), Box::new(body));
                } else {
                    let child = run_test(name, level, body);
                    cell.push_node(ResultNode::Set(child));
                }
            }
        }
    }

    fn into_sync_set(self) -> ResultSet {
        match self.mode {
            Mode::Sync { set } => set,
            Mode::Pooled { .. } => unreachable!("the synchronous runner always builds a sync handle"),
        }
    }
}

// =============================================================================
// SYNCHRONOUS ENGINE
// =============================================================================

/// Execute one test body at the given level and return its finalized set.
pub(crate) fn run_test(
    name: &'static str,
    level: u32,
    body: impl FnOnce(&mut TestHandle),
) -> ResultSet {
    let mut handle = TestHandle::sync(name, level);
    let started = Instant::now();
    if let Some(error) = run_guarded(|| body(&mut handle)) {
        handle.record(ResultNode::UncaughtError(error));
    }
    let mut set = handle.into_sync_set();
    set.finalize(started.elapsed());
    set
}

/// Execute a single test body outside any harness and return its finalized
/// set. Useful for embedding and for exercising the engine directly.
///
/// # Example
/// ```
/// let set = lumentest::runner::run_standalone("demo", |t| {
///     lumentest::req!(t, 1 + 1, ==, 2);
/// });
/// assert!(!set.failed());
/// assert_eq!(set.child_count(), 1);
/// ```
pub fn run_standalone(name: &'static str, body: impl FnOnce(&mut TestHandle)) -> ResultSet {
    run_test(name, 1, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultNode;

    #[test]
    fn empty_body_passes() {
        let set = run_test("empty", 1, |_| {});
        assert!(!set.failed());
        assert_eq!(set.child_count(), 0);
        assert!(set.duration() >= std::time::Duration::ZERO);
    }

    #[test]
    fn assertions_attach_in_order() {
        let set = run_test("ordered", 1, |t| {
            crate::req!(t, 1, ==, 1);
            crate::req!(t, 1, ==, 2);
        });
        assert!(set.failed());
        let failures: Vec<_> = set.children().map(ResultNode::failed).collect();
        assert_eq!(failures, [false, true]);
    }

    #[test]
    fn must_stops_the_body_early() {
        let set = run_test("early", 1, |t| {
            crate::req!(t, 1, ==, 1);
            crate::must!(crate::req!(t, 1, ==, 2));
            crate::req!(t, 2, ==, 2); // never reached
        });
        assert_eq!(set.child_count(), 2);
        assert!(set.failed());
    }

    #[test]
    fn str_panic_becomes_one_uncaught_error() {
        let set = run_test("panics", 1, |t| {
            crate::req!(t, 1, ==, 1);
            panic!("it broke");
        });
        assert!(set.failed());
        assert_eq!(set.child_count(), 2);
        let Some(ResultNode::UncaughtError(err)) = set.children().last() else {
            panic!("expected an uncaught error leaf");
        };
        assert_eq!(err.message(), "it broke");
        assert!(err.location().is_some());
    }

    #[test]
    fn non_string_panic_payload_is_contained() {
        let set = run_test("odd payload", 1, |_| {
            std::panic::panic_any(7_i32);
        });
        assert_eq!(set.child_count(), 1);
        let Some(ResultNode::UncaughtError(err)) = set.children().next() else {
            panic!("expected an uncaught error leaf");
        };
        assert_eq!(err.message(), "unknown panic payload");
    }

    #[test]
    fn sub_tests_recurse_on_the_calling_stack() {
        let set = run_test("outer", 1, |t| {
            t.sub("inner", |t| {
                crate::req!(t, 41, <, 42);
                t.sub("innermost", |t| {
                    crate::req!(t, "a", !=, "b");
                });
            });
        });
        assert!(!set.failed());
        let Some(ResultNode::Set(inner)) = set.children().next() else {
            panic!("expected the sub-test set");
        };
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.child_count(), 2);
    }

    #[test]
    fn panicking_sub_does_not_fault_the_parent_body() {
        let set = run_test("outer", 1, |t| {
            t.sub("bad", |_| panic!("sub broke"));
            t.sub("good", |t| {
                crate::req!(t, true, ==, true);
            });
        });
        assert!(set.failed());
        assert_eq!(set.child_count(), 2);
        let ok_children: Vec<_> = set.children().map(ResultNode::failed).collect();
        assert_eq!(ok_children, [true, false]);
    }
}
