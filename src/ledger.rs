//! Append-only ledger of performed tokens.
//!
//! One plain-text file per task, one token per line, no header. Records are
//! only ever appended; manual edits are tolerated (surrounding whitespace and
//! blank lines are ignored when reading).

use crate::error::{PeriodicalError, Result};
use crate::token::Token;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

/// File-backed record of completed tokens for one task.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Ledger for `task_name` under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::InvalidTaskName`] if the name cannot be used
    /// as a file name.
    pub fn for_task(data_root: &Path, task_name: &str) -> Result<Self> {
        validate_task_name(task_name)?;
        Ok(Self::at(crate::periodical_dirs::ledger_file(
            data_root, task_name,
        )))
    }

    /// Ledger bound to an explicit file path.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file and its directory if absent.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::Ledger`] if either cannot be created.
    pub fn ensure_store_exists(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PeriodicalError::Ledger(format!(
                    "failed to create ledger directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PeriodicalError::Ledger(format!(
                    "failed to create ledger {}: {e}",
                    self.path.display()
                ))
            })?;
        Ok(())
    }

    /// Durably add `token` as the newest record.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid single-line record or the
    /// file cannot be written and synced.
    pub fn append(&self, token: &Token) -> Result<()> {
        token.validate()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PeriodicalError::Ledger(format!("failed to open ledger: {e}")))?;

        // A hand-edited file may lack its final newline.
        let needs_separator = std::fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
            && !ends_with_newline(&self.path)?;

        let mut line = String::with_capacity(token.as_str().len() + 2);
        if needs_separator {
            line.push('\n');
        }
        line.push_str(token.as_str());
        line.push('\n');

        file.write_all(line.as_bytes())
            .map_err(|e| PeriodicalError::Ledger(format!("failed to append to ledger: {e}")))?;
        file.sync_all()
            .map_err(|e| PeriodicalError::Ledger(format!("failed to sync ledger: {e}")))?;
        Ok(())
    }

    /// Every record in file order.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::Ledger`] if the file cannot be read.
    pub fn records(&self) -> Result<Vec<String>> {
        let mut records = Vec::new();
        self.scan(|record| {
            records.push(record.to_owned());
            false
        })?;
        Ok(records)
    }

    /// The most recently appended record, or `None` for an empty ledger.
    ///
    /// This is file order, not the greatest token.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::Ledger`] if the file cannot be read.
    pub fn last_record(&self) -> Result<Option<Token>> {
        let mut last = None;
        self.scan(|record| {
            last = Some(record.to_owned());
            false
        })?;
        Ok(last.map(Token::from))
    }

    /// Whether `token` appears anywhere in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::Ledger`] if the file cannot be read.
    pub fn contains(&self, token: &Token) -> Result<bool> {
        let wanted = token.as_str();
        let mut found = false;
        self.scan(|record| {
            found = record == wanted;
            found
        })?;
        Ok(found)
    }

    /// Try to take the advisory lock guarding check-then-append.
    ///
    /// Returns `None` when another invocation holds the lock. While held, the
    /// guard refreshes the lock file's timestamp every quarter of
    /// `stale_after`, so only a lock whose holder died is ever evicted.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicalError::Ledger`] if the lock file cannot be created
    /// or written for any reason other than already existing.
    pub fn try_lock(&self, stale_after: Duration) -> Result<Option<LedgerLockGuard>> {
        let lock_path = self.lock_path();
        for _ in 0..2 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let owner = lock_owner_stamp();
                    if let Err(e) = file.write_all(owner.as_bytes()) {
                        let _ = std::fs::remove_file(&lock_path);
                        return Err(PeriodicalError::Ledger(format!(
                            "failed to write ledger lock {}: {e}",
                            lock_path.display()
                        )));
                    }
                    return Ok(Some(LedgerLockGuard::start(lock_path, owner, stale_after)));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !evict_stale_lock(&lock_path, stale_after) {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    return Err(PeriodicalError::Ledger(format!(
                        "failed to create ledger lock {}: {e}",
                        lock_path.display()
                    )));
                }
            }
        }
        Ok(None)
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Feed each non-blank, trimmed record to `visit` until it returns `true`.
    fn scan(&self, mut visit: impl FnMut(&str) -> bool) -> Result<()> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(PeriodicalError::Ledger(format!(
                    "failed to read ledger {}: {e}",
                    self.path.display()
                )));
            }
        };

        for line in BufReader::new(file).lines() {
            let line =
                line.map_err(|e| PeriodicalError::Ledger(format!("failed to read ledger: {e}")))?;
            let record = line.trim();
            if record.is_empty() {
                continue;
            }
            if visit(record) {
                break;
            }
        }
        Ok(())
    }
}

/// Held while an invocation owns its ledger.
///
/// A background heartbeat keeps the lock file fresh. On drop the heartbeat
/// stops and the file is removed, but only if it still carries this guard's
/// owner stamp.
#[derive(Debug)]
pub struct LedgerLockGuard {
    path: PathBuf,
    owner: String,
    stop: Option<mpsc::Sender<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl LedgerLockGuard {
    fn start(path: PathBuf, owner: String, stale_after: Duration) -> Self {
        let interval = (stale_after / 4).max(Duration::from_millis(1));
        let (stop, stopped) = mpsc::channel::<()>();
        let beat_path = path.clone();
        let beat_owner = owner.clone();
        let heartbeat = std::thread::spawn(move || {
            while let Err(mpsc::RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                if !refresh_lock(&beat_path, &beat_owner) {
                    tracing::warn!("lost ledger lock {}", beat_path.display());
                    break;
                }
            }
        });
        Self {
            path,
            owner,
            stop: Some(stop),
            heartbeat: Some(heartbeat),
        }
    }
}

impl Drop for LedgerLockGuard {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(heartbeat) = self.heartbeat.take() {
            let _ = heartbeat.join();
        }
        if lock_owned_by(&self.path, &self.owner) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Unique stamp for one lock acquisition: pid, wall clock, and a counter.
fn lock_owner_stamp() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

fn lock_owned_by(path: &Path, owner: &str) -> bool {
    std::fs::read_to_string(path).is_ok_and(|content| content == owner)
}

/// Bump the lock file's timestamp if we still own it. Returns `false` if not.
fn refresh_lock(path: &Path, owner: &str) -> bool {
    if !lock_owned_by(path, owner) {
        return false;
    }
    OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()))
        .is_ok()
}

/// Remove the lock file if it is older than `stale_after`. Returns `true` if removed.
fn evict_stale_lock(lock_path: &Path, stale_after: Duration) -> bool {
    let Ok(modified) = std::fs::metadata(lock_path).and_then(|m| m.modified()) else {
        return false;
    };
    let Ok(age) = SystemTime::now().duration_since(modified) else {
        return false;
    };
    if age <= stale_after {
        return false;
    }
    tracing::warn!(
        "evicting stale ledger lock {} ({}s old)",
        lock_path.display(),
        age.as_secs()
    );
    std::fs::remove_file(lock_path).is_ok()
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = std::fs::File::open(path)
        .map_err(|e| PeriodicalError::Ledger(format!("failed to read ledger: {e}")))?;
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| PeriodicalError::Ledger(format!("failed to read ledger: {e}")))?;
    Ok(last[0] == b'\n')
}

/// Check that a task name is usable as a ledger file name.
///
/// # Errors
///
/// Returns [`PeriodicalError::InvalidTaskName`] for empty names, `.`/`..`,
/// or names containing path separators.
pub fn validate_task_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains(['\n', '\r', '\0']);
    if bad {
        return Err(PeriodicalError::InvalidTaskName(name.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn ledger_in(dir: &tempfile::TempDir) -> Ledger {
        let ledger = Ledger::for_task(dir.path(), "sample").unwrap();
        ledger.ensure_store_exists().unwrap();
        ledger
    }

    #[test]
    fn ensure_store_creates_directory_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_task(dir.path(), "sample").unwrap();
        assert!(!ledger.path().exists());

        ledger.ensure_store_exists().unwrap();
        assert!(ledger.path().exists());
        assert_eq!(std::fs::read_to_string(ledger.path()).unwrap(), "");

        // Idempotent and non-destructive.
        ledger.append(&Token::new("a")).unwrap();
        ledger.ensure_store_exists().unwrap();
        assert_eq!(std::fs::read_to_string(ledger.path()).unwrap(), "a\n");
    }

    #[test]
    fn empty_ledger_has_no_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        assert_eq!(ledger.last_record().unwrap(), None);
        assert!(!ledger.contains(&Token::new("a")).unwrap());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_task(dir.path(), "never-created").unwrap();
        assert_eq!(ledger.last_record().unwrap(), None);
        assert!(ledger.records().unwrap().is_empty());
    }

    #[test]
    fn repeated_token_scan_and_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        for token in ["A", "B", "A"] {
            ledger.append(&Token::new(token)).unwrap();
        }

        assert!(ledger.contains(&Token::new("A")).unwrap());
        assert!(ledger.contains(&Token::new("B")).unwrap());
        assert!(!ledger.contains(&Token::new("C")).unwrap());
        assert_eq!(ledger.last_record().unwrap(), Some(Token::new("A")));
        assert_eq!(
            std::fs::read_to_string(ledger.path()).unwrap(),
            "A\nB\nA\n"
        );
    }

    #[test]
    fn last_record_is_file_order_not_greatest() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.append(&Token::new("2016-02-01")).unwrap();
        ledger.append(&Token::new("2016-01-31")).unwrap();
        assert_eq!(
            ledger.last_record().unwrap(),
            Some(Token::new("2016-01-31"))
        );
    }

    #[test]
    fn hand_edited_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        std::fs::write(ledger.path(), "one  \r\n\n  two").unwrap();

        assert!(ledger.contains(&Token::new("one")).unwrap());
        assert_eq!(ledger.last_record().unwrap(), Some(Token::new("two")));

        ledger.append(&Token::new("three")).unwrap();
        assert_eq!(ledger.records().unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn append_rejects_multiline_token() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let result = ledger.append(&Token::new("a\nb"));
        assert!(matches!(result, Err(PeriodicalError::InvalidToken(_))));
        assert!(ledger.records().unwrap().is_empty());
    }

    #[test]
    fn append_to_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let ledger = Ledger::at(blocker.join("sample.txt"));

        assert!(matches!(
            ledger.ensure_store_exists(),
            Err(PeriodicalError::Ledger(_))
        ));
        assert!(matches!(
            ledger.append(&Token::new("a")),
            Err(PeriodicalError::Ledger(_))
        ));
    }

    #[test]
    fn task_name_validation() {
        assert!(validate_task_name("backup").is_ok());
        assert!(validate_task_name("volume-down_2").is_ok());
        for bad in ["", "  ", ".", "..", "a/b", "a\\b", "a\nb"] {
            assert!(validate_task_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let stale = Duration::from_secs(3600);

        let guard = ledger.try_lock(stale).unwrap();
        assert!(guard.is_some());
        assert!(ledger.try_lock(stale).unwrap().is_none());

        drop(guard);
        assert!(ledger.try_lock(stale).unwrap().is_some());
    }

    #[test]
    fn stale_lock_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        std::fs::write(ledger.lock_path(), "12345").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let guard = ledger.try_lock(Duration::ZERO).unwrap();
        assert!(guard.is_some());
    }

    #[test]
    fn held_lock_survives_past_stale_age() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let stale = Duration::from_millis(200);

        let guard = ledger.try_lock(stale).unwrap();
        assert!(guard.is_some());
        std::thread::sleep(Duration::from_millis(600));

        assert!(ledger.try_lock(stale).unwrap().is_none());
        drop(guard);
        assert!(!ledger.lock_path().exists());
    }

    #[test]
    fn guard_does_not_remove_foreign_lock() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);

        let guard = ledger.try_lock(Duration::from_secs(3600)).unwrap().unwrap();
        std::fs::write(ledger.lock_path(), "someone-else").unwrap();
        drop(guard);

        assert_eq!(
            std::fs::read_to_string(ledger.lock_path()).unwrap(),
            "someone-else"
        );
    }

    #[test]
    fn padded_token_is_not_the_recorded_period() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.append(&Token::new("2016-01-31")).unwrap();

        let padded = Token::new("2016-01-31 ");
        assert!(matches!(
            ledger.append(&padded),
            Err(PeriodicalError::InvalidToken(_))
        ));
        assert!(!ledger.contains(&padded).unwrap());
        assert!(ledger.contains(&Token::new("2016-01-31")).unwrap());
        assert_eq!(ledger.records().unwrap().len(), 1);
    }
}
