use serde::{Deserialize, Serialize};

/// Syscall numbers of the four metadata operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallTable {
    /// `enable_pte_meta`.
    pub enable: libc::c_long,

    /// `disable_pte_meta`.
    pub disable: libc::c_long,

    /// `set_pte_meta`.
    pub set: libc::c_long,

    /// `get_pte_meta`.
    pub get: libc::c_long,
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self {
            enable: 469,
            disable: 470,
            set: 471,
            get: 472,
        }
    }
}

/// Calling convention of `set_pte_meta` and `get_pte_meta`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiConvention {
    /// `set(addr, mdp, ptr)` and `get(addr, ptr)`.
    ///
    /// `ptr` points at the inline word or at the structured buffer.
    #[default]
    Pointer,

    /// `set(addr, value, tag)` and `get(addr)`.
    ///
    /// The packed word is returned in the return register, so words in
    /// `-4095..=-1` cannot be told apart from errors. Structured metadata
    /// is not supported.
    Legacy,
}

/// Configuration of the Linux driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxConfig {
    /// Syscall numbers.
    pub syscalls: SyscallTable,

    /// Calling convention.
    pub convention: AbiConvention,
}

impl LinuxConfig {
    /// Sets the syscall numbers.
    pub fn with_syscalls(self, syscalls: SyscallTable) -> Self {
        Self { syscalls, ..self }
    }

    /// Sets the calling convention.
    pub fn with_convention(self, convention: AbiConvention) -> Self {
        Self { convention, ..self }
    }
}
