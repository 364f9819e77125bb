//! Page-aligned, pinned memory regions.

use std::io;

use memmap2::{MmapMut, MmapOptions};

use crate::{PageGeometry, PteMetaError, Va};

/// Number of attempts [`PageArena::acquire_in_table`] makes before giving up.
const TABLE_PLACEMENT_ATTEMPTS: usize = 8;

/// Allocates memory regions for scenarios.
#[derive(Debug, Clone, Copy)]
pub struct PageArena {
    geometry: PageGeometry,
    pin: bool,
}

impl PageArena {
    /// Creates an arena that hands out pinned regions.
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pin: true,
        }
    }

    /// Creates an arena using the page size reported by the host.
    pub fn host() -> Result<Self, PteMetaError> {
        Ok(Self::new(PageGeometry::host()?))
    }

    /// Sets whether regions are pinned in physical memory.
    pub fn with_pinning(self, pin: bool) -> Self {
        Self { pin, ..self }
    }

    /// Returns the page geometry.
    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// Allocates `page_count` contiguous, page-aligned pages.
    ///
    /// The pages are populated before they are returned and, unless pinning
    /// was disabled, locked in physical memory.
    pub fn acquire(&self, page_count: usize) -> Result<MemoryRegion, PteMetaError> {
        if page_count == 0 {
            return Err(allocation_error(
                page_count,
                io::Error::new(io::ErrorKind::InvalidInput, "page count must be at least 1"),
            ));
        }

        let page_size = self.geometry.page_size as usize;
        let len = page_count.checked_mul(page_size).ok_or_else(|| {
            allocation_error(
                page_count,
                io::Error::new(io::ErrorKind::InvalidInput, "region size overflows"),
            )
        })?;

        let map = MmapOptions::new()
            .len(len)
            .populate()
            .map_anon()
            .map_err(|err| allocation_error(page_count, err))?;

        let mut region = MemoryRegion {
            map,
            page_size,
            pinned: false,
        };

        if region.base().0 % self.geometry.page_size != 0 {
            return Err(allocation_error(
                page_count,
                io::Error::other(format!("region at {} is not page aligned", region.base())),
            ));
        }

        if self.pin {
            region.pin().map_err(|err| allocation_error(page_count, err))?;
        }

        tracing::debug!(
            base = %region.base(),
            pages = page_count,
            pinned = region.pinned,
            "region acquired"
        );

        Ok(region)
    }

    /// Allocates `page_count` pages that are all mapped by a single
    /// last-level page table.
    ///
    /// Regions crossing a table boundary are held until a suitable one is
    /// found, so that the next mapping lands elsewhere, and are released
    /// afterwards.
    pub fn acquire_in_table(&self, page_count: usize) -> Result<MemoryRegion, PteMetaError> {
        if page_count as u64 > self.geometry.entries_per_table {
            return Err(allocation_error(
                page_count,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "a page table maps at most {} pages",
                        self.geometry.entries_per_table
                    ),
                ),
            ));
        }

        let mut rejected = Vec::new();

        for _ in 0..TABLE_PLACEMENT_ATTEMPTS {
            let region = self.acquire(page_count)?;

            if self
                .geometry
                .within_one_table(region.base(), region.len() as u64)
            {
                return Ok(region);
            }

            tracing::debug!(
                base = %region.base(),
                pages = page_count,
                "region crosses a page table boundary"
            );
            rejected.push(region);
        }

        Err(allocation_error(
            page_count,
            io::Error::other("no region within a single page table"),
        ))
    }

    /// Unpins and unmaps a region.
    pub fn release(&self, mut region: MemoryRegion) -> Result<(), PteMetaError> {
        let base = region.base();
        region.unpin()?;

        tracing::debug!(%base, pages = region.page_count(), "region released");
        Ok(())
    }
}

fn allocation_error(pages: usize, source: io::Error) -> PteMetaError {
    PteMetaError::Allocation { pages, source }
}

/// An owned, page-aligned memory region.
///
/// Dropping the region unpins and unmaps it.
pub struct MemoryRegion {
    map: MmapMut,
    page_size: usize,
    pinned: bool,
}

impl MemoryRegion {
    /// Returns the address of the first byte.
    pub fn base(&self) -> Va {
        Va::from_ptr(self.map.as_ptr())
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Checks whether the region is empty. Regions handed out by the arena
    /// never are.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of pages.
    pub fn page_count(&self) -> usize {
        self.map.len() / self.page_size
    }

    /// Returns the address of page `index`, or `None` if out of range.
    pub fn page(&self, index: usize) -> Option<Va> {
        (index < self.page_count()).then(|| self.base() + (index * self.page_size) as u64)
    }

    /// Returns the addresses of all pages.
    pub fn pages(&self) -> impl Iterator<Item = Va> + '_ {
        (0..self.page_count()).map(|index| self.base() + (index * self.page_size) as u64)
    }

    /// Checks whether the region is locked in physical memory.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Returns the contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    /// Returns the contents mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }

    fn pin(&mut self) -> Result<(), io::Error> {
        // SAFETY: the range is exactly the mapping owned by `self.map`.
        if unsafe { libc::mlock(self.map.as_ptr().cast(), self.map.len()) } != 0 {
            return Err(io::Error::last_os_error());
        }

        self.pinned = true;
        Ok(())
    }

    fn unpin(&mut self) -> Result<(), io::Error> {
        if !self.pinned {
            return Ok(());
        }

        self.pinned = false;

        // SAFETY: the range is exactly the mapping owned by `self.map`.
        if unsafe { libc::munlock(self.map.as_ptr().cast(), self.map.len()) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        if let Err(err) = self.unpin() {
            tracing::warn!(base = %self.base(), %err, "failed to unpin region");
        }
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("base", &self.base())
            .field("len", &self.len())
            .field("pinned", &self.pinned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatternOracle;

    fn arena() -> Result<PageArena, PteMetaError> {
        Ok(PageArena::host()?.with_pinning(false))
    }

    #[test]
    fn single_page_is_aligned() -> Result<(), PteMetaError> {
        let arena = arena()?;
        let region = arena.acquire(1)?;

        assert_eq!(region.len() as u64, arena.geometry().page_size);
        assert_eq!(region.base().0 % arena.geometry().page_size, 0);
        assert_eq!(region.page_count(), 1);
        assert_eq!(region.page(0), Some(region.base()));
        assert_eq!(region.page(1), None);
        assert!(!region.is_pinned());

        arena.release(region)
    }

    #[test]
    fn zero_pages_is_rejected() -> Result<(), PteMetaError> {
        assert!(matches!(
            arena()?.acquire(0),
            Err(PteMetaError::Allocation { pages: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn oversized_page_count_is_rejected() -> Result<(), PteMetaError> {
        assert!(matches!(
            arena()?.acquire(usize::MAX),
            Err(PteMetaError::Allocation {
                pages: usize::MAX,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn pinned_region_or_allocation_error() -> Result<(), PteMetaError> {
        let arena = PageArena::host()?;

        // Pinning may be refused by RLIMIT_MEMLOCK; that must surface as an
        // allocation error, never as a silently unpinned region.
        match arena.acquire(1) {
            Ok(region) => {
                assert!(region.is_pinned());
                arena.release(region)?;
            }
            Err(PteMetaError::Allocation { pages, .. }) => assert_eq!(pages, 1),
            Err(err) => return Err(err),
        }
        Ok(())
    }

    #[test]
    fn pages_share_one_table() -> Result<(), PteMetaError> {
        let arena = arena()?;
        let region = arena.acquire_in_table(4)?;
        let geometry = arena.geometry();

        let pages = region.pages().collect::<Vec<_>>();
        assert_eq!(pages.len(), 4);
        assert!(
            pages
                .iter()
                .all(|&page| geometry.table_of(page) == geometry.table_of(region.base()))
        );

        arena.release(region)
    }

    #[test]
    fn oversized_table_request_is_rejected() -> Result<(), PteMetaError> {
        let arena = arena()?;
        let pages = arena.geometry().entries_per_table as usize + 1;
        assert!(matches!(
            arena.acquire_in_table(pages),
            Err(PteMetaError::Allocation { .. })
        ));
        Ok(())
    }

    #[test]
    fn region_holds_pattern() -> Result<(), PteMetaError> {
        let arena = arena()?;
        let mut region = arena.acquire(2)?;
        let oracle = PatternOracle::default();

        oracle.stamp(&mut region);
        oracle.verify(&region, "after stamp")?;

        region.as_mut_slice()[10] ^= 1;
        assert!(oracle.verify(&region, "after corruption").is_err());

        arena.release(region)
    }
}
