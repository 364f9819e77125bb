//! Metadata driver for Linux kernels carrying the PTE metadata syscalls.
//!
//! Syscall numbers and the calling convention are configurable through
//! [`LinuxConfig`]. The defaults match the current kernel patch set:
//! syscalls 469 to 472 with pointer arguments.

mod config;
mod driver;
mod error;

use ptemeta_core::{Errno, PteMetaDriver, PteMetaError, Va};

pub use self::{
    config::{AbiConvention, LinuxConfig, SyscallTable},
    error::Error,
};
use self::driver::LinuxSyscalls;

/// Metadata driver issuing raw syscalls.
pub struct LinuxDriver {
    inner: LinuxSyscalls,
}

impl LinuxDriver {
    /// Creates a new driver.
    ///
    /// Fails with [`PteMetaError::NotSupported`] if the running kernel does
    /// not implement the configured `get_pte_meta` syscall.
    pub fn new(config: LinuxConfig) -> Result<Self, PteMetaError> {
        let inner = LinuxSyscalls::new(config)?;

        tracing::info!(
            syscalls = ?config.syscalls,
            convention = ?config.convention,
            "metadata syscalls available"
        );

        Ok(Self { inner })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LinuxConfig {
        self.inner.config()
    }
}

impl PteMetaDriver for LinuxDriver {
    fn enable(&self, va: Va) -> Result<(), Errno> {
        self.inner.enable(va)
    }

    fn disable(&self, va: Va) -> Result<(), Errno> {
        self.inner.disable(va)
    }

    fn set_inline(&self, va: Va, word: u64) -> Result<(), Errno> {
        self.inner.set_inline(va, word)
    }

    fn set_structured(&self, va: Va, buffer: &[u8]) -> Result<(), Errno> {
        self.inner.set_structured(va, buffer)
    }

    fn get_inline(&self, va: Va) -> Result<u64, Errno> {
        self.inner.get_inline(va)
    }

    fn get_structured(&self, va: Va, buffer: &mut [u8]) -> Result<(), Errno> {
        self.inner.get_structured(va, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_syscall_numbers() {
        let config = LinuxConfig::default();
        assert_eq!(config.syscalls.enable, 469);
        assert_eq!(config.syscalls.disable, 470);
        assert_eq!(config.syscalls.set, 471);
        assert_eq!(config.syscalls.get, 472);
        assert_eq!(config.convention, AbiConvention::Pointer);
    }

    #[test]
    fn not_supported_converts() {
        assert!(matches!(
            PteMetaError::from(Error::NotSupported),
            PteMetaError::NotSupported
        ));
    }
}
