//! Platform adapter for hosts without interactive support.

use super::{Capability, Platform};

/// Adapter that supports no capabilities.
///
/// Used on Linux, Windows, and unknown hosts. Tasks that ask for
/// confirmation run without it; editing the ledger is not offered.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPlatform;

impl Platform for StubPlatform {
    fn supports(&self, _capability: Capability) -> bool {
        false
    }
}
