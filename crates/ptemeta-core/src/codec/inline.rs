//! MDP=0 encoding: a single 64-bit word.
//!
//! Bit 63 carries the type tag, bits 0..=62 carry the value. This is the only
//! place in the workspace that knows the bit layout.

use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Packed inline metadata word as exchanged with the collaborator.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InlineWord(pub u64);

impl InlineWord {
    /// Position of the type tag bit.
    pub const TAG_SHIFT: u32 = 63;

    /// Number of bits available for the value.
    pub const VALUE_BITS: u32 = 63;

    /// Mask selecting the value bits.
    pub const VALUE_MASK: u64 = (1 << Self::VALUE_BITS) - 1;

    /// Returns the type tag.
    pub fn tag(self) -> InlineTag {
        InlineTag::from_bit((self.0 >> Self::TAG_SHIFT) & 1 != 0)
    }

    /// Returns the value bits.
    pub fn value(self) -> u64 {
        self.0 & Self::VALUE_MASK
    }
}

impl std::fmt::Debug for InlineWord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("InlineWord")
            .field("tag", &self.tag())
            .field("value", &format_args!("0x{:x}", self.value()))
            .finish()
    }
}

/// The 1-bit type discriminant of inline metadata.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InlineTag {
    /// The value is plain data.
    #[default]
    Scalar,

    /// The value is a pointer.
    Pointer,
}

impl InlineTag {
    /// Creates a tag from its bit value.
    pub fn from_bit(bit: bool) -> Self {
        if bit { Self::Pointer } else { Self::Scalar }
    }

    /// Returns the bit value of the tag.
    pub fn bit(self) -> u64 {
        match self {
            Self::Scalar => 0,
            Self::Pointer => 1,
        }
    }
}

/// Decoded inline metadata.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InlineMeta {
    /// The type tag.
    pub tag: InlineTag,

    /// The value. Must fit in [`InlineWord::VALUE_BITS`] bits to be encodable.
    pub value: u64,
}

impl InlineMeta {
    /// Creates new inline metadata.
    ///
    /// The value is not validated until [`encode`](Self::encode).
    pub const fn new(tag: InlineTag, value: u64) -> Self {
        Self { tag, value }
    }

    /// Decodes a packed word. Every word decodes.
    pub fn decode(word: u64) -> Self {
        let word = InlineWord(word);

        Self {
            tag: word.tag(),
            value: word.value(),
        }
    }

    /// Packs the metadata into a single word.
    pub fn encode(&self) -> Result<u64, CodecError> {
        if self.value > InlineWord::VALUE_MASK {
            return Err(CodecError::ValueOverflow { value: self.value });
        }

        Ok((self.tag.bit() << InlineWord::TAG_SHIFT) | self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_occupies_top_bit() -> Result<(), CodecError> {
        assert_eq!(InlineMeta::new(InlineTag::Pointer, 0).encode()?, 1 << 63);
        assert_eq!(InlineMeta::new(InlineTag::Scalar, 0).encode()?, 0);
        Ok(())
    }

    #[test]
    fn cafebabe_pointer() -> Result<(), CodecError> {
        let word = InlineMeta::new(InlineTag::Pointer, 0xCAFE_BABE).encode()?;
        assert_eq!(word, 0x8000_0000_CAFE_BABE);

        let meta = InlineMeta::decode(word);
        assert_eq!(meta.tag, InlineTag::Pointer);
        assert_eq!(meta.value, 0xCAFE_BABE);
        Ok(())
    }

    #[test]
    fn largest_value_encodes() -> Result<(), CodecError> {
        let meta = InlineMeta::new(InlineTag::Scalar, InlineWord::VALUE_MASK);
        assert_eq!(InlineMeta::decode(meta.encode()?), meta);
        Ok(())
    }

    #[test]
    fn value_overflow_is_rejected() {
        let meta = InlineMeta::new(InlineTag::Scalar, 1 << 63);
        assert_eq!(
            meta.encode(),
            Err(CodecError::ValueOverflow { value: 1 << 63 })
        );
    }

    #[test]
    fn full_word_splits_into_tag_and_value() -> Result<(), CodecError> {
        let meta = InlineMeta::decode(0xCAFE_BABE_DEAD_BEEF);
        assert_eq!(meta.tag, InlineTag::Pointer);
        assert_eq!(meta.value, 0x4AFE_BABE_DEAD_BEEF);
        assert_eq!(meta.encode()?, 0xCAFE_BABE_DEAD_BEEF);
        Ok(())
    }

    #[test]
    fn round_trip_over_edges() -> Result<(), CodecError> {
        for tag in [InlineTag::Scalar, InlineTag::Pointer] {
            for value in [0, 1, 0xDEAD_BEEF, 1 << 62, InlineWord::VALUE_MASK - 1] {
                let meta = InlineMeta::new(tag, value);
                assert_eq!(InlineMeta::decode(meta.encode()?), meta);
            }
        }
        Ok(())
    }
}
