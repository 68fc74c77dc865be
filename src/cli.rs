//! Command-line configuration.
//!
//! This module uses the `clap` crate with its "derive" feature to map the
//! conventional harness flags onto [`Config`]. [`apply_cli_args`] is a
//! ready-made configuration action: register it (typically first) and the
//! run picks up its flags from argv. Parse failures follow configuration-
//! phase semantics and abort the run.

use clap::error::ErrorKind;
use clap::Parser;

use crate::config::Config;
use crate::error::HarnessError;

/// The flags understood by [`apply_cli_args`].
#[derive(Debug, Parser)]
#[command(
    name = "lumentest",
    about = "A featherweight unit-testing harness.",
    disable_version_flag = true
)]
struct CliArgs {
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Suppress the default result tree and final banner.
    #[arg(long)]
    no_output: bool,

    /// Exit with code 0 even when tests fail.
    #[arg(long)]
    return_zero: bool,

    /// Worker threads for the parallel runner.
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Run global tests on the worker pool.
    #[arg(long)]
    parallel: bool,

    /// Also dispatch sub-tests to the worker pool (implies --parallel).
    #[arg(long)]
    parallel_subs: bool,
}

/// Configuration action translating argv into [`Config`] toggles.
///
/// # Example
/// ```no_run
/// lumentest::harness! {
///     config: [lumentest::cli::apply_cli_args],
///     tests: [],
/// }
/// ```
pub fn apply_cli_args(config: &mut Config, args: &[String]) -> Result<(), HarnessError> {
    let cli = match CliArgs::try_parse_from(args) {
        Ok(cli) => cli,
        // --help short-circuits the whole run, as it would in any CLI.
        Err(err) if err.kind() == ErrorKind::DisplayHelp => err.exit(),
        Err(err) => return Err(err.into()),
    };

    if cli.no_color {
        config.color = false;
    }
    if cli.no_output {
        config.output = false;
    }
    if cli.return_zero {
        config.zero_exit = true;
    }
    if let Some(threads) = cli.threads {
        if threads == 0 {
            return Err(HarnessError::InvalidThreadCount);
        }
        config.threads = threads;
    }
    if cli.parallel {
        config.parallel = true;
    }
    if cli.parallel_subs {
        config.parallel = true;
        config.parallel_subs = true;
    }
    Ok(())
}
