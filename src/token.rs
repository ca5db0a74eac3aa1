//! Period tokens.
//!
//! A [`Token`] names one period (a day, an hour, half a day). The framework
//! never looks inside a token beyond making sure it fits on one ledger line;
//! equality is exact string equality.

use crate::error::{PeriodicalError, Result};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::fmt;

/// Opaque identifier for one period of a periodical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wrap a task-computed string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Token for a calendar day, e.g. `2016-01-31`.
    #[must_use]
    pub fn daily(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// Token for one hour of a day, e.g. `2016-01-31 13`.
    #[must_use]
    pub fn hourly(at: NaiveDateTime) -> Self {
        Self(at.format("%Y-%m-%d %H").to_string())
    }

    /// Token splitting a day in two at `hour`: `<date>-1` before it, `<date>-2` from it on.
    #[must_use]
    pub fn split_day(at: NaiveDateTime, hour: u32) -> Self {
        let half = if at.hour() < hour { 1 } else { 2 };
        Self(format!("{}-{half}", at.format("%Y-%m-%d")))
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the token can be stored as a single ledger record.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::InvalidToken`] for blank tokens, tokens with
    /// leading or trailing whitespace, or tokens containing a line break.
    pub fn validate(&self) -> Result<()> {
        if self.0.trim().is_empty() {
            return Err(PeriodicalError::InvalidToken(
                "token must not be empty".to_owned(),
            ));
        }
        if self.0.trim() != self.0 {
            return Err(PeriodicalError::InvalidToken(format!(
                "token must not have surrounding whitespace: {:?}",
                self.0
            )));
        }
        if self.0.contains(['\n', '\r']) {
            return Err(PeriodicalError::InvalidToken(format!(
                "token must be a single line: {:?}",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
