use crate::{Errno, Va};

/// A trait for implementing a binding to the metadata collaborator.
///
/// Each method performs exactly one call and reports failure as the raw
/// error number. Classification and timing happen in
/// [`MetaClient`](crate::MetaClient).
pub trait PteMetaDriver {
    /// Expands the page table mapping `va`.
    fn enable(&self, va: Va) -> Result<(), Errno>;

    /// Tears down the metadata of the page table mapping `va`.
    fn disable(&self, va: Va) -> Result<(), Errno>;

    /// Attaches a packed inline word to the page containing `va`.
    fn set_inline(&self, va: Va, word: u64) -> Result<(), Errno>;

    /// Attaches an encoded structured buffer to the page containing `va`.
    fn set_structured(&self, va: Va, buffer: &[u8]) -> Result<(), Errno>;

    /// Retrieves the packed inline word of the page containing `va`.
    fn get_inline(&self, va: Va) -> Result<u64, Errno>;

    /// Fills `buffer` with the structured metadata of the page containing
    /// `va`.
    fn get_structured(&self, va: Va, buffer: &mut [u8]) -> Result<(), Errno>;
}
