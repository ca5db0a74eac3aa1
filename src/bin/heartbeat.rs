//! Daily heartbeat periodical.
//!
//! Appends a timestamp to `heartbeat.log` in the data directory (the
//! configured `data_dir` when one is set) at most once
//! per calendar day. Meant to be fired from cron, e.g. `*/10 * * * *`.

use anyhow::Context;
use chrono::Local;
use periodical::{PeriodicalConfig, Task, TaskFault, Token};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

struct Heartbeat {
    log_path: PathBuf,
}

impl Task for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn description(&self) -> &str {
        "Record a heartbeat once per day."
    }

    fn make_token(&self) -> Token {
        Token::daily(Local::now().date_naive())
    }

    fn perform(&mut self) -> Result<bool, TaskFault> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("opening {}", self.log_path.display()))?;
        writeln!(file, "{}", Local::now().to_rfc3339()).context("writing heartbeat")?;
        Ok(true)
    }

    fn configure(&mut self, config: &PeriodicalConfig) {
        self.log_path = config.data_root().join("heartbeat.log");
    }

    fn recover_from_fault(&mut self, fault: &TaskFault) {
        tracing::error!("heartbeat not written to {}: {fault}", self.log_path.display());
    }
}

fn main() -> ExitCode {
    let task = Heartbeat {
        log_path: periodical::periodical_dirs::data_dir().join("heartbeat.log"),
    };
    periodical::cli::run_main(task)
}
