//! The declaration and assertion surface.
//!
//! These macros are the whole user-facing grammar of the harness: declare a
//! program with [`harness!`], nest with [`sub!`], assert with [`req!`],
//! short-circuit with [`must!`]/[`require!`], and measure with [`timer!`]
//! and [`avg_timer!`]. Everything they expand to goes through the explicit
//! [`TestHandle`](crate::TestHandle) context; no macro touches hidden state.

/// Record one assertion: `req!(testing, actual, op, expected)`.
///
/// Both sides are evaluated exactly once, compared with the literal operator
/// token, stringified with `Debug` for the report, and the boolean outcome
/// is returned so tests can branch on it. A failing `req!` marks the test
/// failed but does not stop it; wrap it in [`must!`] for that.
///
/// # Example
/// ```
/// let set = lumentest::runner::run_standalone("req demo", |t| {
///     if lumentest::req!(t, 2 + 2, ==, 4) {
///         lumentest::req!(t, "four", !=, "five");
///     }
/// });
/// assert!(!set.failed());
/// ```
#[macro_export]
macro_rules! req {
    ($testing:expr, $actual:expr, $op:tt, $expected:expr) => {{
        let actual = &$actual;
        let expected = &$expected;
        let passed = actual $op expected;
        $testing.record_assertion($crate::AssertionResult::new(
            $crate::SourceLocation::new(file!(), line!()),
            format!("{:?}", actual),
            format!("{:?}", expected),
            ::std::any::type_name_of_val(actual),
            ::std::any::type_name_of_val(expected),
            stringify!($op),
            concat!(stringify!($actual), " ", stringify!($op), " ", stringify!($expected)),
            !passed,
        ))
    }};
}

/// Return from the enclosing test body when `condition` is false.
///
/// This is a local short-circuit, not a process abort: the test simply ends
/// early and its recorded results stand. Pairs with the boolean returned by
/// [`req!`]: `must!(req!(t, a, ==, b))`.
#[macro_export]
macro_rules! must {
    ($condition:expr) => {
        if !$condition {
            return;
        }
    };
}

/// Record an assertion and end the test body early when it fails.
/// Shorthand for `must!(req!(..))`.
#[macro_export]
macro_rules! require {
    ($testing:expr, $actual:expr, $op:tt, $expected:expr) => {
        $crate::must!($crate::req!($testing, $actual, $op, $expected))
    };
}

/// Declare a sub-test inside a test body: `sub!(testing, Name, |t| { .. })`.
///
/// The closure is `move`, so it captures its environment by value. In the
/// default mode the sub-test runs on the spot; under the parallel runner
/// with sub-test concurrency enabled it is handed to the worker pool.
///
/// # Example
/// ```
/// let set = lumentest::runner::run_standalone("outer", |t| {
///     let answer = 42;
///     lumentest::sub!(t, Inner, |t| {
///         lumentest::req!(t, answer, ==, 42);
///     });
/// });
/// assert!(!set.failed());
/// ```
#[macro_export]
macro_rules! sub {
    ($testing:expr, $name:ident, |$t:ident| $body:block) => {
        $testing.sub(stringify!($name), move |$t: &mut $crate::TestHandle| $body)
    };
}

/// Evaluate an expression once and yield the elapsed wall-clock time in ms.
///
/// # Example
/// ```
/// let mut i = 0;
/// let ms = lumentest::timer!(i += 1);
/// assert!(ms >= 0.0);
/// ```
#[macro_export]
macro_rules! timer {
    ($sentence:expr) => {{
        let started = ::std::time::Instant::now();
        let _ = $sentence;
        started.elapsed().as_secs_f64() * 1000.0
    }};
}

/// Evaluate an expression `times` times and yield the mean elapsed ms.
#[macro_export]
macro_rules! avg_timer {
    ($sentence:expr, $times:expr) => {{
        let times: u32 = $times;
        let mut total = ::std::time::Duration::ZERO;
        for _ in 0..times {
            let started = ::std::time::Instant::now();
            let _ = $sentence;
            total += started.elapsed();
        }
        total.as_secs_f64() * 1000.0 / f64::from(times.max(1))
    }};
}

/// Declare the test program: generates `main` with the full phase sequence.
///
/// Functions are registered in listing order before any phase runs, then the
/// driver executes configuration, tests, default printing, and reports. The
/// process exit code reflects aggregate failure unless configuration forces
/// zero; setup errors exit with code 2.
///
/// # Example
/// ```no_run
/// use lumentest::{req, TestHandle};
///
/// fn arithmetic(t: &mut TestHandle) {
///     req!(t, 1 + 1, ==, 2);
/// }
///
/// lumentest::harness! {
///     config: [lumentest::cli::apply_cli_args],
///     tests: [arithmetic],
///     reports: [lumentest::report::report_failed_tests],
/// }
/// ```
#[macro_export]
macro_rules! harness {
    (
        $( config: [ $( $config:path ),* $(,)? ], )?
        tests: [ $( $test:path ),* $(,)? ]
        $( , reports: [ $( $report:path ),* $(,)? ] )?
        $(,)?
    ) => {
        fn main() -> ::std::process::ExitCode {
            let mut harness = $crate::Harness::from_env();
            $( $( harness.add_config(stringify!($config), $config); )* )?
            $( harness.add_test(stringify!($test), $test); )*
            $( $( harness.add_report(stringify!($report), $report); )* )?
            match harness.execute() {
                Ok(report) => report.exit_code(),
                Err(err) => {
                    eprintln!("{err}");
                    ::std::process::ExitCode::from(2)
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::runner::run_standalone;

    #[test]
    fn req_evaluates_each_side_exactly_once() {
        let set = run_standalone("side effects", |t| {
            let mut left = 0;
            let mut right = 10;
            crate::req!(
                t,
                {
                    left += 1;
                    left
                },
                <,
                {
                    right += 1;
                    right
                }
            );
            crate::req!(t, left, ==, 1);
            crate::req!(t, right, ==, 11);
        });
        assert!(!set.failed());
        assert_eq!(set.child_count(), 3);
    }

    #[test]
    fn req_records_the_source_expression() {
        let set = run_standalone("expr text", |t| {
            crate::req!(t, 1, ==, 2);
        });
        let Some(crate::ResultNode::Assertion(req)) = set.children().next() else {
            panic!("expected an assertion");
        };
        assert_eq!(req.expression(), "1 == 2");
        assert_eq!(req.operator(), "==");
        assert_eq!(req.actual(), "1");
        assert_eq!(req.expected(), "2");
        assert!(req.failed());
    }

    #[test]
    fn mixed_type_comparison_still_reports() {
        let set = run_standalone("mixed", |t| {
            let owned = String::from("abc");
            crate::req!(t, owned, ==, "abc");
        });
        let Some(crate::ResultNode::Assertion(req)) = set.children().next() else {
            panic!("expected an assertion");
        };
        assert!(!req.failed());
        assert_ne!(req.actual_type(), req.expected_type());
    }

    #[test]
    fn require_is_must_over_req() {
        let set = run_standalone("require", |t| {
            crate::require!(t, 1, ==, 1);
            crate::require!(t, 1, ==, 2);
            crate::require!(t, 2, ==, 2); // unreachable
        });
        assert_eq!(set.child_count(), 2);
        assert!(set.failed());
    }

    #[test]
    fn timers_yield_non_negative_millis() {
        let mut i = 0_u64;
        assert!(crate::timer!(i += 1) >= 0.0);
        assert!(crate::avg_timer!(i += 1, 100) >= 0.0);
        assert_eq!(i, 101);
    }
}
