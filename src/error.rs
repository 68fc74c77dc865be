//! Harness error types.
//!
//! Only setup problems surface as `Err`: a bad command line or a failing
//! configuration action aborts the run before any test executes. Assertion
//! failures and panics inside test bodies are *data*: they become nodes in
//! the result tree and never propagate past the test that produced them.

use thiserror::Error;

/// Errors raised while preparing a run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The command line did not parse.
    #[error(transparent)]
    InvalidArgs(#[from] clap::Error),

    /// `--threads 0` would leave the worker pool unable to run anything.
    #[error("worker thread count must be at least 1")]
    InvalidThreadCount,

    /// A user-supplied configuration action reported a failure.
    #[error("configuration action `{name}` failed: {message}")]
    Config { name: String, message: String },
}

impl HarnessError {
    /// Convenience constructor for failures inside configuration actions.
    pub fn config(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_action() {
        let err = HarnessError::config("setup_db", "no socket");
        assert_eq!(
            err.to_string(),
            "configuration action `setup_db` failed: no socket"
        );
    }
}
