//! Skip-or-proceed decision for one invocation.
//!
//! Checks run in a fixed order and the first match wins. Observational
//! requests (edit, status, could-run-now) short-circuit before anything that
//! locks the ledger, asks the user, or touches the network.

use crate::error::{PeriodicalError, Result};
use crate::ledger::{Ledger, LedgerLockGuard};
use crate::platform::{Capability, Platform};
use crate::reachability::ReachabilityCache;
use crate::task::Task;
use crate::token::Token;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// What the caller asked this invocation to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Request {
    /// Normal run.
    #[default]
    Run,
    /// Print the status snapshot.
    Status,
    /// Print whether a run would start.
    CouldRunNow,
    /// Open the ledger in the platform editor.
    Edit,
}

/// Options for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Requested mode.
    pub request: Request,
    /// Run even if the current token was already performed.
    pub force: bool,
}

impl RunOptions {
    /// Normal run, optionally forced.
    #[must_use]
    pub fn run(force: bool) -> Self {
        Self {
            request: Request::Run,
            force,
        }
    }

    /// Observational or editing request.
    #[must_use]
    pub fn request(request: Request) -> Self {
        Self {
            request,
            force: false,
        }
    }
}

/// Why a run did not proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The task's own predicate says not now.
    NotApplicableNow,
    /// The current token is already in the ledger.
    AlreadyPerformed,
    /// The user declined the confirmation dialog.
    UserDeclined,
    /// The task needs the network and it is unreachable.
    NoNetwork,
    /// Another invocation holds the ledger lock.
    Busy,
}

impl SkipReason {
    /// Whether the skip should be surfaced as a failed run.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::NoNetwork)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotApplicableNow => "should not perform now",
            Self::AlreadyPerformed => "already performed for this token",
            Self::UserDeclined => "user declined",
            Self::NoNetwork => "network unreachable",
            Self::Busy => "another run holds the ledger lock",
        };
        f.write_str(text)
    }
}

/// Human-readable state of a periodical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Task name, also the ledger file stem.
    pub name: String,
    /// Whether a normal, unforced run would start now.
    pub could_run_now: bool,
    /// Whether the current token is already in the ledger.
    pub performed_for_token: bool,
    /// Last ledger record in file order, `None` for an empty ledger.
    pub last_performed: Option<Token>,
    /// Token for the current period.
    pub current_token: Token,
    /// The task's own applicability verdict.
    pub should_perform_now: bool,
    /// Where the ledger lives.
    pub ledger_path: PathBuf,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self
            .last_performed
            .as_ref()
            .map_or_else(|| "none".to_owned(), Token::to_string);
        writeln!(f, "periodical name:          {}", self.name)?;
        writeln!(f, "could run now:            {}", self.could_run_now)?;
        writeln!(f, "performed for this token: {}", self.performed_for_token)?;
        writeln!(f, "last performed token:     {last}")?;
        writeln!(f, "current token:            {}", self.current_token)?;
        writeln!(f, "should perform now:       {}", self.should_perform_now)?;
        write!(f, "ledger file:              {}", self.ledger_path.display())
    }
}

/// Outcome of the decision engine.
#[derive(Debug)]
pub enum Decision {
    /// Open the ledger in the editor.
    Edit,
    /// Report the status snapshot.
    Status(StatusSnapshot),
    /// Report whether a run would start.
    CouldRunNow(bool),
    /// Do not run.
    Skip(SkipReason),
    /// Run the task body; the lock, if taken, is held until dropped.
    Proceed { lock: Option<LedgerLockGuard> },
}

/// Decides whether one invocation should run its task.
pub struct DecisionEngine<'a> {
    ledger: &'a Ledger,
    platform: &'a dyn Platform,
    reachability: &'a ReachabilityCache,
    exclusive: Option<Duration>,
}

impl<'a> DecisionEngine<'a> {
    /// Engine over the given collaborators.
    #[must_use]
    pub fn new(
        ledger: &'a Ledger,
        platform: &'a dyn Platform,
        reachability: &'a ReachabilityCache,
    ) -> Self {
        Self {
            ledger,
            platform,
            reachability,
            exclusive: None,
        }
    }

    /// Take the ledger lock before the already-performed check.
    /// Locks older than `stale_after` are evicted.
    #[must_use]
    pub fn with_exclusive_lock(mut self, stale_after: Duration) -> Self {
        self.exclusive = Some(stale_after);
        self
    }

    /// Decide what to do for `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or locked, if editing is
    /// requested on a platform without an editor, or if the confirmation
    /// dialog cannot be shown.
    pub fn decide<T: Task + ?Sized>(
        &self,
        task: &T,
        token: &Token,
        options: &RunOptions,
    ) -> Result<Decision> {
        match options.request {
            Request::Edit => {
                if !self.platform.supports(Capability::OpenTextFile) {
                    return Err(PeriodicalError::Unsupported(
                        Capability::OpenTextFile.to_string(),
                    ));
                }
                return Ok(Decision::Edit);
            }
            Request::Status => return Ok(Decision::Status(self.status(task, token)?)),
            Request::CouldRunNow => {
                return Ok(Decision::CouldRunNow(self.could_run_now(task, token)?));
            }
            Request::Run => {}
        }

        if !task.should_perform_now() {
            return Ok(Decision::Skip(SkipReason::NotApplicableNow));
        }

        if !options.force && self.ledger.contains(token)? {
            return Ok(Decision::Skip(SkipReason::AlreadyPerformed));
        }

        let confirmation = task
            .confirm_message()
            .filter(|_| self.platform.supports(Capability::ConfirmUser));
        if let Some(message) = confirmation {
            let accepted = self
                .platform
                .confirm_user(&message)
                .map_err(|e| PeriodicalError::Platform(e.to_string()))?;
            if !accepted {
                return Ok(Decision::Skip(SkipReason::UserDeclined));
            }
        }

        if task.needs_network() && !self.reachability.is_reachable() {
            return Ok(Decision::Skip(SkipReason::NoNetwork));
        }

        // The lock is only taken once nothing interactive remains, and the
        // ledger is read again under it.
        let lock = match self.exclusive {
            Some(stale_after) => match self.ledger.try_lock(stale_after)? {
                Some(guard) => {
                    if !options.force && self.ledger.contains(token)? {
                        return Ok(Decision::Skip(SkipReason::AlreadyPerformed));
                    }
                    Some(guard)
                }
                None => return Ok(Decision::Skip(SkipReason::Busy)),
            },
            None => None,
        };

        Ok(Decision::Proceed { lock })
    }

    /// Whether a normal, unforced run would start now.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn could_run_now<T: Task + ?Sized>(&self, task: &T, token: &Token) -> Result<bool> {
        Ok(task.should_perform_now() && !self.ledger.contains(token)?)
    }

    /// Snapshot of the task's state, without side effects.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn status<T: Task + ?Sized>(&self, task: &T, token: &Token) -> Result<StatusSnapshot> {
        let performed_for_token = self.ledger.contains(token)?;
        let should_perform_now = task.should_perform_now();
        Ok(StatusSnapshot {
            name: task.name().to_owned(),
            could_run_now: should_perform_now && !performed_for_token,
            performed_for_token,
            last_performed: self.ledger.last_record()?,
            current_token: token.clone(),
            should_perform_now,
            ledger_path: self.ledger.path().to_path_buf(),
        })
    }
}
