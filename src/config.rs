//! Run configuration.
//!
//! A [`Config`] is plain mutable state handed to every configuration-phase
//! action before any test runs. The driver and the default printer consume
//! it afterwards; test bodies never see it.

/// Worker count used when `--threads` is not given.
pub const DEFAULT_THREAD_COUNT: usize = 10;

/// Process-wide toggles for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Colorize the default tree output and banners.
    pub color: bool,
    /// Print the result tree and final banner after the test phase.
    pub output: bool,
    /// Exit with code 0 even when tests failed.
    pub zero_exit: bool,
    /// Worker threads for the parallel runner.
    pub threads: usize,
    /// Run global tests on the worker pool instead of the calling thread.
    pub parallel: bool,
    /// Also dispatch sub-tests to the worker pool.
    pub parallel_subs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: atty::is(atty::Stream::Stdout),
            output: true,
            zero_exit: false,
            threads: DEFAULT_THREAD_COUNT,
            parallel: false,
            parallel_subs: false,
        }
    }
}
