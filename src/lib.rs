//! Lumentest: a featherweight unit-testing harness.
//!
//! Tests are plain functions taking an explicit [`TestHandle`]; the
//! [`harness!`] macro wires them into a generated `main` that runs the fixed
//! phase order (configuration, tests, reports) and exits non-zero on
//! aggregate failure. Assertions ([`req!`], [`must!`], [`require!`]) and
//! inline sub-tests ([`sub!`]) accumulate into a hierarchical result tree
//! that reporting code traverses after the run. An opt-in parallel runner
//! executes tests across a worker pool while a completion tree guarantees
//! the drain waits for every dynamically spawned sub-test.
//!
//! ```no_run
//! use lumentest::{req, sub, TestHandle};
//!
//! fn arithmetic(t: &mut TestHandle) {
//!     req!(t, 1 + 1, ==, 2);
//!     sub!(t, Negatives, |t| {
//!         req!(t, -1, <, 0);
//!     });
//! }
//!
//! lumentest::harness! {
//!     config: [lumentest::cli::apply_cli_args],
//!     tests: [arithmetic],
//!     reports: [lumentest::report::report_failed_tests],
//! }
//! ```

pub use crate::config::Config;
pub use crate::error::HarnessError;
pub use crate::harness::{Harness, RunReport};
pub use crate::registry::{Phase, Registry};
pub use crate::results::{
    AssertionResult, ResultNode, ResultSet, SourceLocation, UncaughtErrorResult,
};
pub use crate::runner::TestHandle;

pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
mod macros;
mod pool;
pub mod registry;
pub mod report;
pub mod results;
pub mod runner;
