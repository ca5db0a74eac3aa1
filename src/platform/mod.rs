//! Host-specific interactive capabilities.
//!
//! A [`Platform`] reports which optional [`Capability`]s it has and
//! implements them. On macOS dialogs and TextEdit are used; every other host
//! gets a stub that supports nothing.

use std::fmt;
use std::path::Path;

#[cfg(target_os = "macos")]
mod macos;
mod stub;

#[cfg(target_os = "macos")]
pub use macos::MacOsPlatform;
pub use stub::StubPlatform;

/// Optional interactive capability of a platform adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Ask the user whether a task may run.
    ConfirmUser,
    /// Open a text file in an editor.
    OpenTextFile,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmUser => f.write_str("confirm_user"),
            Self::OpenTextFile => f.write_str("open_text_file"),
        }
    }
}

/// Host-specific interaction used by the controller.
///
/// Callers check [`supports`](Platform::supports) before calling a
/// capability method; unsupported methods return an error.
pub trait Platform: Send + Sync {
    /// Whether `capability` is available on this host.
    fn supports(&self, capability: Capability) -> bool;

    /// Show `message` and return `true` if the user agrees to proceed.
    fn confirm_user(&self, _message: &str) -> anyhow::Result<bool> {
        anyhow::bail!("{} is not supported on this platform", Capability::ConfirmUser)
    }

    /// Open `path` in the host's text editor.
    fn open_text_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("{} is not supported on this platform", Capability::OpenTextFile)
    }
}

/// Create the platform adapter for the current host.
pub fn detect() -> Box<dyn Platform> {
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacOsPlatform::new())
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(stub::StubPlatform)
    }
}
