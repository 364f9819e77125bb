//! Metadata encodings.
//!
//! The collaborator accepts metadata in one of two representations, selected
//! by the metadata-payload discriminator (MDP):
//!
//! - MDP=0: [`InlineMeta`], a single 64-bit word with a 1-bit type tag.
//! - MDP=1: [`StructuredMeta`], a header followed by a variable-length
//!   payload, laid out according to a [`HeaderLayout`].

mod inline;
mod structured;

use serde::{Deserialize, Serialize};

pub use self::{
    inline::{InlineMeta, InlineTag, InlineWord},
    structured::{HeaderLayout, StructuredHeader, StructuredMeta},
};
use crate::CodecError;

/// Metadata-payload discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mdp {
    /// Inline 64-bit word.
    Inline,

    /// Structured header and payload buffer.
    Structured,
}

impl Mdp {
    /// Returns the raw discriminator passed to the collaborator.
    pub fn raw(self) -> u64 {
        match self {
            Self::Inline => 0,
            Self::Structured => 1,
        }
    }
}

impl std::fmt::Display for Mdp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "mdp={}", self.raw())
    }
}

/// Metadata attached to a single page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataValue {
    /// MDP=0 metadata.
    Inline(InlineMeta),

    /// MDP=1 metadata.
    Structured(StructuredMeta),
}

impl MetadataValue {
    /// Creates inline metadata from a tag and a value.
    pub fn inline(tag: InlineTag, value: u64) -> Self {
        Self::Inline(InlineMeta::new(tag, value))
    }

    /// Creates inline metadata from a full packed word.
    pub fn word(word: u64) -> Self {
        Self::Inline(InlineMeta::decode(word))
    }

    /// Creates structured metadata.
    pub fn structured(version: u32, kind: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self::Structured(StructuredMeta::new(version, kind, payload))
    }

    /// Returns the discriminator of this value.
    pub fn mdp(&self) -> Mdp {
        match self {
            Self::Inline(_) => Mdp::Inline,
            Self::Structured(_) => Mdp::Structured,
        }
    }

    /// Returns the payload length of structured metadata, zero for inline.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Inline(_) => 0,
            Self::Structured(meta) => meta.payload.len(),
        }
    }
}

impl From<InlineMeta> for MetadataValue {
    fn from(value: InlineMeta) -> Self {
        Self::Inline(value)
    }
}

impl From<StructuredMeta> for MetadataValue {
    fn from(value: StructuredMeta) -> Self {
        Self::Structured(value)
    }
}

/// Checks that metadata read back from the collaborator equals what was
/// written.
pub fn verify_round_trip(
    written: &MetadataValue,
    read: &MetadataValue,
) -> Result<(), CodecError> {
    if written != read {
        return Err(CodecError::RoundTrip {
            written: Box::new(written.clone()),
            read: Box::new(read.clone()),
        });
    }

    Ok(())
}
