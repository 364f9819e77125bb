//! Simulated metadata collaborator.
//!
//! Keeps per-table lifecycle and per-page metadata in memory and answers the
//! four operations with the same error numbers as the kernel extension:
//!
//! | Situation | Error number |
//! |---|---|
//! | `enable` on an expanded table | `EEXIST` |
//! | `disable` on an unexpanded table | `EINVAL` |
//! | `set` on an unexpanded table without auto-expansion | `ENOENT` |
//! | `get` on an unexpanded table or an unset page | `ENODATA` |
//! | malformed structured buffer, mismatched encoding | `EINVAL` |
//! | NULL address | `EFAULT` |
//!
//! [`SimFaults`] turn the simulator into a broken collaborator, which is how
//! the harness proves it detects one.

mod config;
mod driver;
mod error;

use ptemeta_core::{Errno, PageGeometry, PteMetaDriver, PteMetaError, Va};

pub use self::{
    config::{SimConfig, SimFaults},
    driver::Stored,
    error::Error,
};
use self::driver::SimCollaborator;

/// Simulated metadata collaborator.
pub struct SimDriver {
    inner: SimCollaborator,
}

impl SimDriver {
    /// Creates a new simulated collaborator.
    pub fn new(config: SimConfig) -> Result<Self, PteMetaError> {
        let geometry = PageGeometry::new(config.page_size)?;

        tracing::debug!(?config, "simulated collaborator created");

        Ok(Self {
            inner: SimCollaborator::new(config, geometry),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SimConfig {
        self.inner.config()
    }

    /// Checks whether the table mapping `va` is expanded.
    pub fn is_expanded(&self, va: Va) -> bool {
        self.inner.is_expanded(va)
    }

    /// Returns the metadata stored for the page containing `va`.
    pub fn stored(&self, va: Va) -> Option<Stored> {
        self.inner.stored(va)
    }
}

fn check_address(va: Va) -> Result<(), Error> {
    if va.is_null() {
        return Err(Error::BadAddress);
    }

    Ok(())
}

impl PteMetaDriver for SimDriver {
    fn enable(&self, va: Va) -> Result<(), Errno> {
        check_address(va)?;
        Ok(self.inner.enable(va)?)
    }

    fn disable(&self, va: Va) -> Result<(), Errno> {
        check_address(va)?;
        Ok(self.inner.disable(va)?)
    }

    fn set_inline(&self, va: Va, word: u64) -> Result<(), Errno> {
        check_address(va)?;
        Ok(self.inner.set(va, Stored::Inline(word))?)
    }

    fn set_structured(&self, va: Va, buffer: &[u8]) -> Result<(), Errno> {
        check_address(va)?;
        self.inner.check_structured(buffer)?;
        Ok(self.inner.set(va, Stored::Structured(buffer.to_vec()))?)
    }

    fn get_inline(&self, va: Va) -> Result<u64, Errno> {
        check_address(va)?;
        Ok(self.inner.get_inline(va)?)
    }

    fn get_structured(&self, va: Va, buffer: &mut [u8]) -> Result<(), Errno> {
        check_address(va)?;
        Ok(self.inner.get_structured(va, buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ptemeta_core::{HeaderLayout, StructuredMeta, UnsetRead, host_page_size};

    use super::*;

    const VA: Va = Va(0x7f00_0040_0000);
    const PAGE: u64 = 0x1000;

    fn make_driver(config: SimConfig) -> Result<SimDriver, PteMetaError> {
        SimDriver::new(
            config
                .with_page_size(PAGE)
                .with_expansion_cost(Duration::ZERO),
        )
    }

    #[test]
    fn default_page_size_is_host() -> Result<(), PteMetaError> {
        let host = host_page_size()?;
        assert_eq!(SimConfig::default().page_size, host);

        let sim = SimDriver::new(SimConfig::default())?;
        assert_eq!(sim.config().page_size, host);
        Ok(())
    }

    #[test]
    fn lifecycle_errnos() -> Result<(), PteMetaError> {
        let sim = make_driver(SimConfig::default())?;

        assert_eq!(sim.disable(VA), Err(Errno::EINVAL));
        assert_eq!(sim.get_inline(VA), Err(Errno::ENODATA));

        assert_eq!(sim.enable(VA), Ok(()));
        assert_eq!(sim.enable(VA + PAGE), Err(Errno::EEXIST));
        assert!(sim.is_expanded(VA));

        assert_eq!(sim.disable(VA), Ok(()));
        assert_eq!(sim.disable(VA), Err(Errno::EINVAL));
        assert!(!sim.is_expanded(VA));
        Ok(())
    }

    #[test]
    fn auto_expand_on_set() -> Result<(), PteMetaError> {
        let sim = make_driver(SimConfig::default().with_auto_expand_on_set(true))?;
        assert_eq!(sim.set_inline(VA, 42), Ok(()));
        assert!(sim.is_expanded(VA));
        assert_eq!(sim.get_inline(VA), Ok(42));

        let strict = make_driver(SimConfig::default().with_auto_expand_on_set(false))?;
        assert_eq!(strict.set_inline(VA, 42), Err(Errno::ENOENT));
        assert!(!strict.is_expanded(VA));
        Ok(())
    }

    #[test]
    fn unset_read_contract() -> Result<(), PteMetaError> {
        let no_data = make_driver(SimConfig::default().with_unset_read(UnsetRead::NoData))?;
        no_data.enable(VA)?;
        assert_eq!(no_data.get_inline(VA), Err(Errno::ENODATA));

        let zeroed = make_driver(SimConfig::default().with_unset_read(UnsetRead::Zeroed))?;
        assert_eq!(zeroed.get_inline(VA), Err(Errno::ENODATA));
        zeroed.enable(VA)?;
        assert_eq!(zeroed.get_inline(VA), Ok(0));
        Ok(())
    }

    #[test]
    fn pages_are_independent() -> Result<(), PteMetaError> {
        let sim = make_driver(SimConfig::default())?;
        sim.enable(VA)?;

        for i in 0..4 {
            sim.set_inline(VA + i * PAGE, 0xDEAD_BEEF_0000_0000 | i)?;
        }

        for i in 0..4 {
            assert_eq!(sim.get_inline(VA + i * PAGE), Ok(0xDEAD_BEEF_0000_0000 | i));
        }
        Ok(())
    }

    #[test]
    fn structured_buffers() -> Result<(), PteMetaError> {
        let sim = make_driver(SimConfig::default().with_header_layout(HeaderLayout::Wide))?;
        let buffer = StructuredMeta::new(1, 0x1234, [1, 2, 3, 4]).encode(HeaderLayout::Wide)?;

        sim.enable(VA)?;
        sim.set_structured(VA, &buffer)?;
        assert_eq!(sim.stored(VA), Some(Stored::Structured(buffer.clone())));

        let mut out = vec![0; buffer.len()];
        sim.get_structured(VA, &mut out)?;
        assert_eq!(out, buffer);

        let mut short = vec![0; buffer.len() - 1];
        assert_eq!(sim.get_structured(VA, &mut short), Err(Errno::EINVAL));
        assert_eq!(sim.get_inline(VA), Err(Errno::EINVAL));

        // Declared length does not match the payload.
        assert_eq!(
            sim.set_structured(VA, &buffer[..buffer.len() - 1]),
            Err(Errno::EINVAL)
        );
        Ok(())
    }

    #[test]
    fn null_address() -> Result<(), PteMetaError> {
        let sim = make_driver(SimConfig::default())?;
        assert_eq!(sim.enable(Va(0)), Err(Errno::EFAULT));
        assert_eq!(sim.get_inline(Va(0)), Err(Errno::EFAULT));
        Ok(())
    }

    #[test]
    fn invalid_page_size() {
        assert!(matches!(
            SimDriver::new(SimConfig::default().with_page_size(3000)),
            Err(PteMetaError::InvalidPageSize(3000))
        ));
    }

    #[test]
    fn faults() -> Result<(), PteMetaError> {
        let shared = make_driver(SimConfig::default().with_faults(SimFaults::SHARED_SLOT))?;
        shared.set_inline(VA, 1)?;
        shared.set_inline(VA + PAGE, 2)?;
        assert_eq!(shared.get_inline(VA), Ok(2));

        let sticky = make_driver(SimConfig::default().with_faults(SimFaults::STICKY_METADATA))?;
        sticky.set_inline(VA, 1)?;
        sticky.disable(VA)?;
        sticky.enable(VA)?;
        assert_eq!(sticky.get_inline(VA), Ok(1));

        let permissive =
            make_driver(SimConfig::default().with_faults(SimFaults::PERMISSIVE_ENABLE))?;
        permissive.enable(VA)?;
        assert_eq!(permissive.enable(VA), Ok(()));

        let corrupt = make_driver(SimConfig::default().with_faults(SimFaults::CORRUPT_PAYLOAD))?;
        corrupt.set_inline(VA, 0x10)?;
        assert_eq!(corrupt.get_inline(VA), Ok(0x11));
        Ok(())
    }

    #[test]
    fn expansion_cost_is_paid_once() -> Result<(), PteMetaError> {
        let cost = Duration::from_millis(50);
        let sim = SimDriver::new(SimConfig::default().with_expansion_cost(cost))?;

        let start = std::time::Instant::now();
        sim.set_inline(VA, 1)?;
        assert!(start.elapsed() >= cost);

        let start = std::time::Instant::now();
        sim.set_inline(VA + PAGE, 2)?;
        assert!(start.elapsed() < cost);
        Ok(())
    }
}
