//! Deferred registration of run phases.
//!
//! A [`Registry`] holds three ordered lists of named callables, one per
//! [`Phase`]. Declaration happens through the [`harness!`] macro, which adds
//! every listed function before the driver runs any phase, so the lifecycle
//! is fully defined: all `add`s for a phase happen before that phase runs,
//! and each list is consumed exactly once, in registration order.
//!
//! Failure semantics differ per phase: configuration actions return
//! `Result` and an error is fatal to the run, test actions are guarded by
//! the execution engine (a panic becomes a result node), and report actions
//! only read the finished tree.
//!
//! [`harness!`]: crate::harness!

use std::mem;

use crate::config::Config;
use crate::error::HarnessError;
use crate::results::ResultSet;
use crate::runner::TestHandle;

/// The fixed phase order of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mutates the [`Config`] from argv; errors abort the run.
    Config,
    /// Produces the result tree.
    Test,
    /// Reads the finalized tree.
    Report,
}

/// A configuration-phase callable: receives the config and the captured argv.
pub type ConfigAction = fn(&mut Config, &[String]) -> Result<(), HarnessError>;

/// A test-phase callable: a test body taking its explicit context handle.
pub type TestAction = fn(&mut TestHandle);

/// A report-phase callable: read-only access to the run root.
pub type ReportAction = fn(&ResultSet);

/// A named deferred callable within one phase list.
#[derive(Debug)]
pub struct Entry<A> {
    pub name: &'static str,
    pub action: A,
}

/// Ordered phase lists of deferred callables.
#[derive(Debug, Default)]
pub struct Registry {
    config: Vec<Entry<ConfigAction>>,
    tests: Vec<Entry<TestAction>>,
    reports: Vec<Entry<ReportAction>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the configuration list. Constant time, side-effect only.
    pub fn add_config(&mut self, name: &'static str, action: ConfigAction) {
        self.config.push(Entry { name, action });
    }

    /// Append to the test list. Registering the same name twice is not
    /// guarded against; both entries will run.
    pub fn add_test(&mut self, name: &'static str, action: TestAction) {
        self.tests.push(Entry { name, action });
    }

    /// Append to the report list.
    pub fn add_report(&mut self, name: &'static str, action: ReportAction) {
        self.reports.push(Entry { name, action });
    }

    pub fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Config => self.config.len(),
            Phase::Test => self.tests.len(),
            Phase::Report => self.reports.len(),
        }
    }

    pub fn is_empty(&self, phase: Phase) -> bool {
        self.len(phase) == 0
    }

    /// Drain the configuration list for consumption. The list is left empty
    /// so a phase can never execute twice.
    pub(crate) fn take_config(&mut self) -> Vec<Entry<ConfigAction>> {
        mem::take(&mut self.config)
    }

    pub(crate) fn take_tests(&mut self) -> Vec<Entry<TestAction>> {
        mem::take(&mut self.tests)
    }

    pub(crate) fn take_reports(&mut self) -> Vec<Entry<ReportAction>> {
        mem::take(&mut self.reports)
    }
}
