//! Periodical: run a task at most once per period.
//!
//! An external scheduler (cron, launchd) fires a periodical binary often,
//! say every ten minutes. Each invocation asks the task for the token of the
//! current period and performs the work only if that token is not yet in the
//! task's ledger. Success appends the token, so later invocations in the
//! same period do nothing, while failures retry on the next tick.
//!
//! # Architecture
//!
//! - **Ledger**: append-only file of completed tokens, one per line
//! - **Reachability cache**: shared, time-bounded internet check
//! - **Decision engine**: fixed-order skip-or-proceed checks
//! - **Controller**: computes the token once, decides, performs, records
//! - **Platform**: optional confirmation dialogs and ledger editing

pub mod cli;
pub mod config;
pub mod controller;
pub mod decision;
pub mod error;
pub mod ledger;
pub mod periodical_dirs;
pub mod platform;
pub mod reachability;
pub mod task;
pub mod token;

pub use config::PeriodicalConfig;
pub use controller::{Outcome, Periodical, RunReport};
pub use decision::{Request, RunOptions, SkipReason, StatusSnapshot};
pub use error::{PeriodicalError, Result};
pub use ledger::Ledger;
pub use platform::{Capability, Platform};
pub use reachability::{Probe, ReachabilityCache};
pub use task::{Task, TaskFault};
pub use token::Token;
