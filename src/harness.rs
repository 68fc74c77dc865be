//! The run driver.
//!
//! A [`Harness`] owns the registry, the configuration, and the captured
//! argv, and executes the fixed phase sequence: configuration actions (any
//! error is fatal), the test phase (synchronous engine or worker pool),
//! default tree printing, registered report actions, and the final banner.
//! [`execute`](Harness::execute) returns a [`RunReport`] so embedders and
//! tests can inspect the tree instead of exiting.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::HarnessError;
use crate::pool;
use crate::registry::{ConfigAction, Phase, Registry, ReportAction, TestAction};
use crate::report;
use crate::results::{ResultNode, ResultSet};
use crate::runner;

/// Drives one run of registered configuration, test, and report actions.
pub struct Harness {
    registry: Registry,
    config: Config,
    args: Vec<String>,
}

impl Harness {
    /// A harness capturing the process argv, as generated `main`s use.
    pub fn from_env() -> Self {
        Self::with_args(std::env::args().collect())
    }

    /// A harness with an explicit argv, for embedding and tests.
    pub fn with_args(args: Vec<String>) -> Self {
        Self {
            registry: Registry::new(),
            config: Config::default(),
            args,
        }
    }

    /// Direct access to the configuration, for programmatic setup that does
    /// not go through a registered action.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn add_config(&mut self, name: &'static str, action: ConfigAction) {
        self.registry.add_config(name, action);
    }

    pub fn add_test(&mut self, name: &'static str, action: TestAction) {
        self.registry.add_test(name, action);
    }

    pub fn add_report(&mut self, name: &'static str, action: ReportAction) {
        self.registry.add_report(name, action);
    }

    /// Run every phase in order and hand back the finished tree.
    ///
    /// Configuration errors abort before any test runs. Test failures are
    /// never errors here; they live in the returned tree.
    pub fn execute(mut self) -> Result<RunReport, HarnessError> {
        let started = Instant::now();

        for entry in self.registry.take_config() {
            (entry.action)(&mut self.config, &self.args)?;
        }

        let mut root = if self.config.parallel {
            pool::run_tests(self.registry.take_tests(), &self.config)
        } else {
            let mut root = ResultSet::new("", 0);
            for entry in self.registry.take_tests() {
                let set = runner::run_test(entry.name, 1, entry.action);
                root.add(ResultNode::Set(set));
            }
            root
        };
        root.finalize(started.elapsed());

        if self.config.output {
            report::print_tree(&root, &self.config);
        }

        let has_reports = !self.registry.is_empty(Phase::Report);
        if has_reports {
            report::print_report_frame_open();
            for entry in self.registry.take_reports() {
                (entry.action)(&root);
            }
            report::print_report_frame_close();
        }

        let total = started.elapsed();
        if self.config.output {
            report::print_final_banner(&root, total, &self.config);
        }

        Ok(RunReport {
            results: root,
            total,
            zero_exit: self.config.zero_exit,
        })
    }
}

/// The outcome of a full run.
#[derive(Debug)]
pub struct RunReport {
    /// The finalized run root; global tests are its direct children.
    pub results: ResultSet,
    /// Total wall-clock time of the run.
    pub total: Duration,
    zero_exit: bool,
}

impl RunReport {
    /// Whether any test anywhere in the tree failed.
    pub fn failed(&self) -> bool {
        self.results.failed()
    }

    /// The process exit code: failure maps to 1 unless configuration forced
    /// zero.
    pub fn exit_code(&self) -> ExitCode {
        if self.failed() && !self.zero_exit {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(config: &mut Config, _args: &[String]) -> Result<(), HarnessError> {
        config.output = false;
        Ok(())
    }

    fn failing_config(_: &mut Config, _: &[String]) -> Result<(), HarnessError> {
        Err(HarnessError::config("failing_config", "broken setup"))
    }

    fn passing_test(t: &mut runner::TestHandle) {
        crate::req!(t, 1, ==, 1);
    }

    #[test]
    fn config_errors_abort_the_run() {
        let mut harness = Harness::with_args(vec![]);
        harness.add_config("failing_config", failing_config);
        harness.add_test("never_runs", passing_test);
        let err = harness.execute().unwrap_err();
        assert!(matches!(err, HarnessError::Config { .. }));
    }

    #[test]
    fn empty_run_succeeds() {
        let mut harness = Harness::with_args(vec![]);
        harness.add_config("quiet", quiet);
        let report = harness.execute().unwrap();
        assert!(!report.failed());
        assert_eq!(report.results.child_count(), 0);
        assert!(report.total >= Duration::ZERO);
    }

    #[test]
    fn config_actions_see_the_captured_argv() {
        fn wants_flag(config: &mut Config, args: &[String]) -> Result<(), HarnessError> {
            config.zero_exit = args.iter().any(|a| a == "--return-zero");
            config.output = false;
            Ok(())
        }
        let mut harness = Harness::with_args(vec!["prog".into(), "--return-zero".into()]);
        harness.add_config("wants_flag", wants_flag);
        let report = harness.execute().unwrap();
        assert!(!report.failed());
    }
}
