//! The caller-supplied side of a periodical.
//!
//! Implement [`Task`] to define what runs and how its period is named:
//!
//! - required: [`Task::name`], [`Task::make_token`], [`Task::perform`]
//! - optional: [`Task::should_perform_now`], [`Task::needs_network`],
//!   [`Task::confirm_message`], [`Task::recover_from_fault`],
//!   [`Task::configure`]

use crate::config::PeriodicalConfig;
use crate::token::Token;

/// Abnormal outcome of [`Task::perform`].
///
/// Ordinary failure is `Ok(false)`; a fault is for work that broke in a way
/// the operator should hear about.
#[derive(Debug, thiserror::Error)]
pub enum TaskFault {
    /// The user cancelled the work. Never passed to the recovery hook.
    #[error("cancelled by user")]
    Interrupted,

    /// Unexpected failure inside the task body.
    #[error(transparent)]
    Error(#[from] anyhow::Error),
}

/// A unit of work that should happen at most once per period.
pub trait Task {
    /// Short, unique name. Also names the task's ledger file.
    fn name(&self) -> &str;

    /// Human-readable description shown in `--help`.
    fn description(&self) -> &str {
        ""
    }

    /// Token for the current period.
    ///
    /// Called exactly once per invocation, before any work starts. A run that
    /// takes a long time is still recorded against the period it started in.
    fn make_token(&self) -> Token;

    /// Do the work. `Ok(true)` on success, `Ok(false)` on ordinary failure.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskFault`] for abnormal failures.
    fn perform(&mut self) -> Result<bool, TaskFault>;

    /// Whether this is an appropriate moment at all (e.g. weekdays only).
    fn should_perform_now(&self) -> bool {
        true
    }

    /// Whether the work needs the internet.
    fn needs_network(&self) -> bool {
        false
    }

    /// Message shown when asking the user for permission to run.
    ///
    /// `None` runs without asking.
    fn confirm_message(&self) -> Option<String> {
        None
    }

    /// Best-effort handling of a fault before it is re-raised.
    fn recover_from_fault(&mut self, _fault: &TaskFault) {}

    /// Called once with the loaded configuration, before any decision is made.
    ///
    /// Tasks that keep their own files should place them under
    /// [`PeriodicalConfig::data_root`].
    fn configure(&mut self, _config: &PeriodicalConfig) {}
}
