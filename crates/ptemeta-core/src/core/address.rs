use serde::{Deserialize, Serialize};

use super::macros::impl_ops;
use crate::PteMetaError;

impl_ops!(Va, u64, "Virtual Address");
impl_ops!(TableId, u64, "Page Table Identifier (base of the address span it maps)");

impl Va {
    /// Creates a virtual address from a pointer.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as u64)
    }

    /// Checks if the virtual address is NULL.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Index of a page within the last-level page table that maps it.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PageIndex(pub u32);

impl std::fmt::Display for PageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page and page-table geometry of the host.
///
/// A last-level page table holds `page_size / 8` entries, so one table maps
/// `page_size * page_size / 8` bytes (2 MiB with 4 KiB pages). Metadata
/// lifecycle is tracked per table, metadata values per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageGeometry {
    /// The size of a page in bytes.
    pub page_size: u64,

    /// The shift value to convert a page number to a page address.
    pub page_shift: u32,

    /// Number of entries in a last-level page table.
    pub entries_per_table: u64,
}

/// Size of a single page-table entry in bytes.
const PTE_SIZE: u64 = 8;

/// Largest accepted page size (1 GiB).
pub const MAX_PAGE_SIZE: u64 = 1 << 30;

impl PageGeometry {
    /// Creates the geometry for the given page size.
    ///
    /// The page size must be a power of two, hold at least one entry and not
    /// exceed [`MAX_PAGE_SIZE`].
    pub fn new(page_size: u64) -> Result<Self, PteMetaError> {
        if !page_size.is_power_of_two() || !(PTE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PteMetaError::InvalidPageSize(page_size));
        }

        Ok(Self {
            page_size,
            page_shift: page_size.trailing_zeros(),
            entries_per_table: page_size / PTE_SIZE,
        })
    }

    /// Creates the geometry from the page size reported by the host.
    pub fn host() -> Result<Self, PteMetaError> {
        Self::new(host_page_size()?)
    }

    /// Returns the number of bytes mapped by one last-level page table.
    pub fn table_span(&self) -> u64 {
        self.page_size * self.entries_per_table
    }

    /// Returns the page table that maps the given address.
    pub fn table_of(&self, va: Va) -> TableId {
        TableId(va.0 & !(self.table_span() - 1))
    }

    /// Returns the index of the page within its page table.
    pub fn page_index(&self, va: Va) -> PageIndex {
        let index = (va.0 & (self.table_span() - 1)) >> self.page_shift;
        PageIndex(index as u32)
    }

    /// Checks whether the byte range `[va, va + len)` is mapped by a single
    /// page table.
    pub fn within_one_table(&self, va: Va, len: u64) -> bool {
        if len == 0 {
            return true;
        }

        self.table_of(va) == self.table_of(va + (len - 1))
    }
}

/// Returns the page size of the host.
pub fn host_page_size() -> Result<u64, PteMetaError> {
    // SAFETY: sysconf has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw <= 0 {
        return Err(PteMetaError::Io(std::io::Error::last_os_error()));
    }

    Ok(raw as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_layout_4k() -> Result<(), PteMetaError> {
        let geometry = PageGeometry::new(0x1000)?;
        assert_eq!(geometry.page_shift, 12);
        assert_eq!(geometry.entries_per_table, 512);
        assert_eq!(geometry.table_span(), 0x20_0000);

        let va = Va(0x7f00_0020_3000);
        assert_eq!(geometry.table_of(va), TableId(0x7f00_0020_0000));
        assert_eq!(geometry.page_index(va), PageIndex(3));
        assert!(geometry.within_one_table(Va(0x7f00_0020_0000), 0x20_0000));
        assert!(!geometry.within_one_table(Va(0x7f00_0020_1000), 0x20_0000));
        Ok(())
    }

    #[test]
    fn largest_page_size_indexes_every_entry() -> Result<(), PteMetaError> {
        let geometry = PageGeometry::new(MAX_PAGE_SIZE)?;
        let last = geometry.entries_per_table - 1;

        let va = Va(geometry.table_span() * 3 + last * MAX_PAGE_SIZE);
        assert_eq!(geometry.page_index(va), PageIndex(last as u32));
        assert_eq!(geometry.table_of(va), TableId(geometry.table_span() * 3));
        Ok(())
    }

    #[test]
    fn rejected_page_sizes() {
        for page_size in [0, 4, 3000, MAX_PAGE_SIZE * 2] {
            assert!(matches!(
                PageGeometry::new(page_size),
                Err(PteMetaError::InvalidPageSize(size)) if size == page_size
            ));
        }
    }
}
