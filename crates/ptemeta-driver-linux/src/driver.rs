use ptemeta_core::{Errno, InlineWord, Mdp, Va};

use crate::{AbiConvention, Error, LinuxConfig};

/// Raw syscall bindings.
pub struct LinuxSyscalls {
    config: LinuxConfig,
}

impl LinuxSyscalls {
    pub fn new(config: LinuxConfig) -> Result<Self, Error> {
        let syscalls = Self { config };
        syscalls.probe()?;
        Ok(syscalls)
    }

    pub fn config(&self) -> &LinuxConfig {
        &self.config
    }

    /// Issues `get_pte_meta` on the NULL address. Any answer other than
    /// `ENOSYS` means the syscall exists.
    fn probe(&self) -> Result<(), Error> {
        // SAFETY: the kernel validates the NULL address and pointer.
        let result = check(unsafe {
            libc::syscall(
                self.config.syscalls.get,
                0 as libc::c_ulong,
                std::ptr::null_mut::<u64>(),
            )
        });

        match result {
            Err(Errno::ENOSYS) => Err(Error::NotSupported),
            Err(errno) => {
                tracing::debug!(%errno, "metadata syscalls present");
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }

    pub fn enable(&self, va: Va) -> Result<(), Errno> {
        // SAFETY: the call takes a plain address and touches no user memory.
        check(unsafe { libc::syscall(self.config.syscalls.enable, va.0 as libc::c_ulong) })?;
        Ok(())
    }

    pub fn disable(&self, va: Va) -> Result<(), Errno> {
        // SAFETY: the call takes a plain address and touches no user memory.
        check(unsafe { libc::syscall(self.config.syscalls.disable, va.0 as libc::c_ulong) })?;
        Ok(())
    }

    pub fn set_inline(&self, va: Va, word: u64) -> Result<(), Errno> {
        let result = match self.config.convention {
            AbiConvention::Pointer => {
                // SAFETY: `word` outlives the call and is only read.
                unsafe {
                    libc::syscall(
                        self.config.syscalls.set,
                        va.0 as libc::c_ulong,
                        Mdp::Inline.raw() as libc::c_ulong,
                        &word as *const u64,
                    )
                }
            }
            AbiConvention::Legacy => {
                let word = InlineWord(word);

                // SAFETY: all arguments are plain integers.
                unsafe {
                    libc::syscall(
                        self.config.syscalls.set,
                        va.0 as libc::c_ulong,
                        word.value() as libc::c_ulong,
                        word.tag().bit() as libc::c_ulong,
                    )
                }
            }
        };

        check(result)?;
        Ok(())
    }

    pub fn set_structured(&self, va: Va, buffer: &[u8]) -> Result<(), Errno> {
        if self.config.convention == AbiConvention::Legacy {
            return Err(Errno::EOPNOTSUPP);
        }

        // SAFETY: `buffer` outlives the call and is only read. Its length is
        // carried in the encoded header.
        check(unsafe {
            libc::syscall(
                self.config.syscalls.set,
                va.0 as libc::c_ulong,
                Mdp::Structured.raw() as libc::c_ulong,
                buffer.as_ptr(),
            )
        })?;
        Ok(())
    }

    pub fn get_inline(&self, va: Va) -> Result<u64, Errno> {
        match self.config.convention {
            AbiConvention::Pointer => {
                let mut word = 0u64;

                // SAFETY: `word` is a valid, writable u64 for the call.
                check(unsafe {
                    libc::syscall(
                        self.config.syscalls.get,
                        va.0 as libc::c_ulong,
                        &mut word as *mut u64,
                    )
                })?;
                Ok(word)
            }
            AbiConvention::Legacy => {
                clear_errno();

                // SAFETY: the call takes a plain address and touches no user
                // memory.
                let raw =
                    unsafe { libc::syscall(self.config.syscalls.get, va.0 as libc::c_ulong) };
                if raw == -1 {
                    let errno = Errno::last();
                    if errno.0 != 0 {
                        return Err(errno);
                    }
                }

                Ok(raw as u64)
            }
        }
    }

    pub fn get_structured(&self, va: Va, buffer: &mut [u8]) -> Result<(), Errno> {
        if self.config.convention == AbiConvention::Legacy {
            return Err(Errno::EOPNOTSUPP);
        }

        // SAFETY: `buffer` is writable for the call and sized for the header
        // and the expected payload.
        check(unsafe {
            libc::syscall(
                self.config.syscalls.get,
                va.0 as libc::c_ulong,
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(())
    }
}

fn check(result: libc::c_long) -> Result<libc::c_long, Errno> {
    if result < 0 {
        return Err(Errno::last());
    }

    Ok(result)
}

fn clear_errno() {
    // SAFETY: `__errno_location` returns the calling thread's errno slot.
    unsafe { *libc::__errno_location() = 0 };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy() -> LinuxSyscalls {
        LinuxSyscalls {
            config: LinuxConfig::default().with_convention(AbiConvention::Legacy),
        }
    }

    #[test]
    fn legacy_rejects_structured_metadata() {
        let syscalls = legacy();
        let mut buffer = [0u8; 8];

        assert_eq!(
            syscalls.set_structured(Va(0x1000), &buffer),
            Err(Errno::EOPNOTSUPP)
        );
        assert_eq!(
            syscalls.get_structured(Va(0x1000), &mut buffer),
            Err(Errno::EOPNOTSUPP)
        );
    }

    #[test]
    fn negative_results_are_errors() {
        assert_eq!(check(0), Ok(0));
        assert_eq!(check(42), Ok(42));
        assert!(check(-1).is_err());
    }
}
