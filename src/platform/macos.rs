//! macOS adapter.
//!
//! Confirmation uses an AppleScript `display dialog` through `osascript`;
//! files open with `open -a`.

use std::path::Path;
use std::process::{Command, Stdio};

use super::{Capability, Platform};

/// Application used for [`Platform::open_text_file`]. Every Mac has it.
const TEXT_EDITOR: &str = "TextEdit";

/// macOS adapter supporting confirmation dialogs and opening files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacOsPlatform;

impl MacOsPlatform {
    /// Create a new macOS adapter.
    pub fn new() -> Self {
        Self
    }

    /// Open `path` with `application`.
    pub fn open_path(&self, application: &str, path: &Path) -> anyhow::Result<()> {
        let status = Command::new("open")
            .arg("-a")
            .arg(application)
            .arg(path)
            .status()
            .map_err(|e| anyhow::anyhow!("failed to launch open: {e}"))?;
        if !status.success() {
            anyhow::bail!("open -a {application} {} exited with {status}", path.display());
        }
        Ok(())
    }
}

impl Platform for MacOsPlatform {
    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::ConfirmUser | Capability::OpenTextFile
        )
    }

    fn confirm_user(&self, message: &str) -> anyhow::Result<bool> {
        // The dialog waits up to a day; "Cancel" makes osascript exit non-zero.
        let script = format!(
            "tell application \"System Events\"\n\
             with timeout of 86400 seconds\n\
             display dialog \"{}\"\n\
             end timeout\n\
             end tell",
            escape_applescript(message)
        );
        let status = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| anyhow::anyhow!("failed to launch osascript: {e}"))?;
        Ok(status.success())
    }

    fn open_text_file(&self, path: &Path) -> anyhow::Result<()> {
        self.open_path(TEXT_EDITOR, path)
    }
}

fn escape_applescript(message: &str) -> String {
    message.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_both_capabilities() {
        let platform = MacOsPlatform::new();
        assert!(platform.supports(Capability::ConfirmUser));
        assert!(platform.supports(Capability::OpenTextFile));
    }

    #[test]
    fn applescript_quotes_are_escaped() {
        assert_eq!(escape_applescript(r#"run "backup"?"#), r#"run \"backup\"?"#);
        assert_eq!(escape_applescript(r"a\b"), r"a\\b");
    }
}
