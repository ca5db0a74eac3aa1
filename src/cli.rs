//! Command-line entry point shared by periodical binaries.
//!
//! A binary only needs to construct its task and hand it to [`run_main`]:
//!
//! ```no_run
//! # use periodical::{Task, TaskFault, Token};
//! # struct Backup;
//! # impl Task for Backup {
//! #     fn name(&self) -> &str { "backup" }
//! #     fn make_token(&self) -> Token { Token::new("2016-01-31") }
//! #     fn perform(&mut self) -> Result<bool, TaskFault> { Ok(true) }
//! # }
//! fn main() -> std::process::ExitCode {
//!     periodical::cli::run_main(Backup)
//! }
//! ```
//!
//! All diagnostics go to stderr; stdout carries only `--status` and
//! `--could-run-now` output.

use crate::config::PeriodicalConfig;
use crate::controller::{Outcome, Periodical, exit_code_for_error};
use crate::decision::{Request, RunOptions};
use crate::error::Result;
use crate::platform::{self, Capability, Platform};
use crate::reachability::ReachabilityCache;
use crate::task::Task;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const ARG_STATUS: &str = "status";
const ARG_COULD_RUN_NOW: &str = "could-run-now";
const ARG_FORCE: &str = "force";
const ARG_EDIT: &str = "edit-perform-file";
const ARG_CONFIG: &str = "config";

/// Build the command-line surface for a task.
///
/// `-e/--edit-perform-file` is only offered when `can_edit` is set.
#[must_use]
pub fn command(task_name: &str, description: &str, can_edit: bool) -> Command {
    let mut modes = vec![ARG_STATUS, ARG_COULD_RUN_NOW];

    let mut cmd = Command::new(task_name.to_owned())
        .about(description.to_owned())
        .after_help(format!(
            "On success the run's token is appended to performed/{task_name}.txt \
             under the data directory; --status shows the full path."
        ))
        .arg(
            Arg::new(ARG_STATUS)
                .short('s')
                .long(ARG_STATUS)
                .action(ArgAction::SetTrue)
                .help("get status of this periodical, and exit"),
        )
        .arg(
            Arg::new(ARG_COULD_RUN_NOW)
                .short('c')
                .long(ARG_COULD_RUN_NOW)
                .action(ArgAction::SetTrue)
                .help("print whether running now would perform, and exit"),
        )
        .arg(
            Arg::new(ARG_FORCE)
                .short('f')
                .long(ARG_FORCE)
                .action(ArgAction::SetTrue)
                .help("perform even if already performed for the current token"),
        )
        .arg(
            Arg::new(ARG_CONFIG)
                .long(ARG_CONFIG)
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("path to TOML configuration file"),
        );

    if can_edit {
        cmd = cmd.arg(
            Arg::new(ARG_EDIT)
                .short('e')
                .long(ARG_EDIT)
                .action(ArgAction::SetTrue)
                .help("open the performed file in your platform's editor, and exit"),
        );
        modes.push(ARG_EDIT);
    }

    cmd.group(ArgGroup::new("mode").args(modes).multiple(false))
}

/// Translate parsed arguments into [`RunOptions`].
#[must_use]
pub fn parse_options(matches: &ArgMatches) -> RunOptions {
    let flag = |id: &str| {
        matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    };

    let request = if flag(ARG_EDIT) {
        Request::Edit
    } else if flag(ARG_STATUS) {
        Request::Status
    } else if flag(ARG_COULD_RUN_NOW) {
        Request::CouldRunNow
    } else {
        Request::Run
    };

    RunOptions {
        request,
        force: flag(ARG_FORCE),
    }
}

/// Config file path chosen on the command line, or the default location.
#[must_use]
pub fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>(ARG_CONFIG)
        .cloned()
        .unwrap_or_else(PeriodicalConfig::default_config_path)
}

/// Install the stderr tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to `periodical=info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("periodical=info")),
        )
        .try_init();
}

/// Parse the process arguments, run `task` once, and map the outcome to an exit code.
pub fn run_main<T: Task>(task: T) -> ExitCode {
    init_tracing();

    let platform: Arc<dyn Platform> = Arc::from(platform::detect());
    let matches = command(
        task.name(),
        task.description(),
        platform.supports(Capability::OpenTextFile),
    )
    .get_matches();

    let code = match run_with(task, &matches, platform) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            exit_code_for_error(&e)
        }
    };
    ExitCode::from(code)
}

fn run_with<T: Task>(
    mut task: T,
    matches: &ArgMatches,
    platform: Arc<dyn Platform>,
) -> Result<u8> {
    let config = PeriodicalConfig::load_or_default(&config_path(matches))?;
    task.configure(&config);
    let reachability = Arc::new(ReachabilityCache::from_config(&config.reachability));
    let mut periodical = Periodical::from_config(task, &config, platform, reachability)?;

    let report = periodical.run(&parse_options(matches))?;
    match &report.outcome {
        Outcome::Status(snapshot) => println!("{snapshot}"),
        Outcome::CouldRunNow(could) => println!("{could}"),
        _ => {}
    }
    Ok(report.exit_code())
}
