//! Execution controller: one invocation of a periodical, end to end.
//!
//! The token is computed once, before anything else looks at the ledger,
//! and that same token is what gets recorded when the task succeeds.

use crate::config::PeriodicalConfig;
use crate::decision::{Decision, DecisionEngine, RunOptions, SkipReason, StatusSnapshot};
use crate::error::{PeriodicalError, Result};
use crate::ledger::Ledger;
use crate::platform::Platform;
use crate::reachability::ReachabilityCache;
use crate::task::{Task, TaskFault};
use crate::token::Token;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Exit code for a successful run or an informational request.
pub const EXIT_OK: u8 = 0;
/// Exit code for a failed run or a required-but-unreachable network.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code for a task fault that was re-raised (`EX_SOFTWARE`).
///
/// Kept apart from 2, which clap uses for usage errors.
pub const EXIT_FAULT: u8 = 70;
/// Exit code for a user cancellation.
pub const EXIT_INTERRUPTED: u8 = 130;

/// What happened during one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The ledger was opened in the platform editor.
    Edited,
    /// Status snapshot, to be printed by the caller.
    Status(StatusSnapshot),
    /// Whether a run would start now.
    CouldRunNow(bool),
    /// The task body was not invoked.
    Skipped(SkipReason),
    /// The task succeeded and the token was recorded.
    Performed,
    /// The task reported an ordinary failure; nothing was recorded.
    Failed,
}

/// Result of [`Periodical::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Token computed for this invocation.
    pub token: Token,
    /// What happened.
    pub outcome: Outcome,
}

impl RunReport {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match &self.outcome {
            Outcome::Failed => EXIT_FAILURE,
            Outcome::Skipped(reason) if reason.is_failure() => EXIT_FAILURE,
            _ => EXIT_OK,
        }
    }
}

/// Process exit code for an invocation that returned an error.
#[must_use]
pub fn exit_code_for_error(err: &PeriodicalError) -> u8 {
    match err {
        PeriodicalError::Fault(_) => EXIT_FAULT,
        PeriodicalError::Interrupted => EXIT_INTERRUPTED,
        _ => EXIT_FAILURE,
    }
}

/// A task bound to its ledger and the shared collaborators it runs with.
pub struct Periodical<T: Task> {
    task: T,
    ledger: Ledger,
    platform: Arc<dyn Platform>,
    reachability: Arc<ReachabilityCache>,
    exclusive: Option<Duration>,
}

impl<T: Task> Periodical<T> {
    /// Bind `task` to its ledger under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::InvalidTaskName`] if the task's name cannot
    /// name a ledger file.
    pub fn new(
        task: T,
        data_root: &Path,
        platform: Arc<dyn Platform>,
        reachability: Arc<ReachabilityCache>,
    ) -> Result<Self> {
        let ledger = Ledger::for_task(data_root, task.name())?;
        Ok(Self {
            task,
            ledger,
            platform,
            reachability,
            exclusive: None,
        })
    }

    /// Bind `task` using the data root and lock policy from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::InvalidTaskName`] if the task's name cannot
    /// name a ledger file.
    pub fn from_config(
        task: T,
        config: &PeriodicalConfig,
        platform: Arc<dyn Platform>,
        reachability: Arc<ReachabilityCache>,
    ) -> Result<Self> {
        let periodical = Self::new(task, &config.data_root(), platform, reachability)?;
        Ok(if config.ledger.exclusive {
            periodical.with_exclusive_lock(config.ledger.stale_lock_after())
        } else {
            periodical
        })
    }

    /// Hold the ledger lock from the already-performed check through the append.
    #[must_use]
    pub fn with_exclusive_lock(mut self, stale_after: Duration) -> Self {
        self.exclusive = Some(stale_after);
        self
    }

    /// The wrapped task.
    pub fn task(&self) -> &T {
        &self.task
    }

    /// The wrapped task, mutably.
    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    /// The task's ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Unwrap the task.
    pub fn into_task(self) -> T {
        self.task
    }

    /// Run one invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be created, read, or appended,
    /// if the token is invalid, if a platform capability fails, or if the
    /// task faulted ([`PeriodicalError::Fault`], after the recovery hook ran)
    /// or was cancelled ([`PeriodicalError::Interrupted`]).
    pub fn run(&mut self, options: &RunOptions) -> Result<RunReport> {
        let span = tracing::info_span!("periodical", task = self.task.name());
        let _enter = span.enter();

        self.ledger.ensure_store_exists()?;

        let token = self.task.make_token();
        token.validate()?;

        let mut engine =
            DecisionEngine::new(&self.ledger, self.platform.as_ref(), &self.reachability);
        if let Some(stale_after) = self.exclusive {
            engine = engine.with_exclusive_lock(stale_after);
        }
        let decision = engine.decide(&self.task, &token, options)?;

        let outcome = match decision {
            Decision::Edit => {
                self.platform
                    .open_text_file(self.ledger.path())
                    .map_err(|e| PeriodicalError::Platform(e.to_string()))?;
                Outcome::Edited
            }
            Decision::Status(snapshot) => Outcome::Status(snapshot),
            Decision::CouldRunNow(could) => Outcome::CouldRunNow(could),
            Decision::Skip(reason) => {
                if reason.is_failure() {
                    warn!(%token, "not performing: {reason}");
                } else {
                    debug!(%token, "not performing: {reason}");
                }
                Outcome::Skipped(reason)
            }
            Decision::Proceed { lock } => {
                let outcome = self.perform(&token)?;
                drop(lock);
                outcome
            }
        };

        Ok(RunReport { token, outcome })
    }

    fn perform(&mut self, token: &Token) -> Result<Outcome> {
        info!(%token, "performing");
        match self.task.perform() {
            Ok(true) => {
                self.ledger.append(token)?;
                info!(%token, "performed");
                Ok(Outcome::Performed)
            }
            Ok(false) => {
                warn!(%token, "task failed; will retry next invocation");
                Ok(Outcome::Failed)
            }
            Err(TaskFault::Interrupted) => {
                warn!(%token, "task cancelled by user");
                Err(PeriodicalError::Interrupted)
            }
            Err(fault) => {
                error!(%token, error = %fault, "task faulted");
                self.task.recover_from_fault(&fault);
                Err(PeriodicalError::Fault(fault))
            }
        }
    }
}
