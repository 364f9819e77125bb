//! MDP=1 encoding: a fixed header immediately followed by the payload.
//!
//! The header carries `version`, `kind` and `length`, in that order, with no
//! padding before the payload. Collaborators disagree on field widths, so
//! the layout is a parameter rather than a constant.

use serde::{Deserialize, Serialize};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{NativeEndian, U16, U32},
};

use crate::CodecError;

/// Header layout of structured metadata.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderLayout {
    /// `u16 version`, `u16 kind`, `u32 length` (8 bytes).
    #[default]
    Compact,

    /// `u32 version`, `u32 kind`, `u32 length` (12 bytes).
    Wide,

    /// `u32 version`, `u32 kind`, `u32 length`, `u32 reserved` (16 bytes).
    ///
    /// The reserved word is written as zero and must read back as zero.
    WideReserved,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct CompactHeader {
    version: U16<NativeEndian>,
    kind: U16<NativeEndian>,
    length: U32<NativeEndian>,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct WideHeader {
    version: U32<NativeEndian>,
    kind: U32<NativeEndian>,
    length: U32<NativeEndian>,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct WideReservedHeader {
    version: U32<NativeEndian>,
    kind: U32<NativeEndian>,
    length: U32<NativeEndian>,
    reserved: U32<NativeEndian>,
}

/// Header fields independent of the layout they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredHeader {
    /// Format version.
    pub version: u32,

    /// Metadata kind.
    pub kind: u32,

    /// Declared payload length in bytes.
    pub length: u32,
}

impl HeaderLayout {
    /// Returns the size of the header in bytes.
    pub fn header_len(self) -> usize {
        match self {
            Self::Compact => size_of::<CompactHeader>(),
            Self::Wide => size_of::<WideHeader>(),
            Self::WideReserved => size_of::<WideReservedHeader>(),
        }
    }

    /// Returns the largest value the `version` and `kind` fields can hold.
    pub fn max_field(self) -> u32 {
        match self {
            Self::Compact => u16::MAX as u32,
            Self::Wide | Self::WideReserved => u32::MAX,
        }
    }

    fn check_field(self, field: &'static str, value: u32) -> Result<(), CodecError> {
        if value > self.max_field() {
            return Err(CodecError::FieldOverflow {
                field,
                value: u64::from(value),
                layout: self,
            });
        }

        Ok(())
    }

    /// Appends the encoded header to `out`.
    pub fn write_header(
        self,
        header: StructuredHeader,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        self.check_field("version", header.version)?;
        self.check_field("kind", header.kind)?;

        match self {
            Self::Compact => out.extend_from_slice(
                CompactHeader {
                    version: U16::new(header.version as u16),
                    kind: U16::new(header.kind as u16),
                    length: U32::new(header.length),
                }
                .as_bytes(),
            ),
            Self::Wide => out.extend_from_slice(
                WideHeader {
                    version: U32::new(header.version),
                    kind: U32::new(header.kind),
                    length: U32::new(header.length),
                }
                .as_bytes(),
            ),
            Self::WideReserved => out.extend_from_slice(
                WideReservedHeader {
                    version: U32::new(header.version),
                    kind: U32::new(header.kind),
                    length: U32::new(header.length),
                    reserved: U32::new(0),
                }
                .as_bytes(),
            ),
        }

        Ok(())
    }

    /// Splits `buffer` into the decoded header and the bytes following it.
    pub fn read_header(self, buffer: &[u8]) -> Result<(StructuredHeader, &[u8]), CodecError> {
        let truncated = || CodecError::Truncated {
            required: self.header_len(),
            available: buffer.len(),
        };

        match self {
            Self::Compact => {
                let (raw, rest) = CompactHeader::read_from_prefix(buffer).map_err(|_| truncated())?;
                let header = StructuredHeader {
                    version: u32::from(raw.version.get()),
                    kind: u32::from(raw.kind.get()),
                    length: raw.length.get(),
                };
                Ok((header, rest))
            }
            Self::Wide => {
                let (raw, rest) = WideHeader::read_from_prefix(buffer).map_err(|_| truncated())?;
                let header = StructuredHeader {
                    version: raw.version.get(),
                    kind: raw.kind.get(),
                    length: raw.length.get(),
                };
                Ok((header, rest))
            }
            Self::WideReserved => {
                let (raw, rest) =
                    WideReservedHeader::read_from_prefix(buffer).map_err(|_| truncated())?;

                if raw.reserved.get() != 0 {
                    return Err(CodecError::ReservedNotZero(raw.reserved.get()));
                }

                let header = StructuredHeader {
                    version: raw.version.get(),
                    kind: raw.kind.get(),
                    length: raw.length.get(),
                };
                Ok((header, rest))
            }
        }
    }
}

/// Decoded structured metadata.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredMeta {
    /// Format version.
    pub version: u32,

    /// Metadata kind.
    pub kind: u32,

    /// Payload bytes. The header's length field is derived from this.
    pub payload: Vec<u8>,
}

impl StructuredMeta {
    /// Creates new structured metadata.
    pub fn new(version: u32, kind: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            kind,
            payload: payload.into(),
        }
    }

    /// Returns the number of bytes produced by [`encode`](Self::encode).
    pub fn encoded_len(&self, layout: HeaderLayout) -> usize {
        layout.header_len() + self.payload.len()
    }

    /// Encodes the header followed by the payload.
    pub fn encode(&self, layout: HeaderLayout) -> Result<Vec<u8>, CodecError> {
        let length =
            u32::try_from(self.payload.len()).map_err(|_| CodecError::FieldOverflow {
                field: "length",
                value: self.payload.len() as u64,
                layout,
            })?;

        let mut buffer = Vec::with_capacity(self.encoded_len(layout));
        layout.write_header(
            StructuredHeader {
                version: self.version,
                kind: self.kind,
                length,
            },
            &mut buffer,
        )?;
        buffer.extend_from_slice(&self.payload);

        Ok(buffer)
    }

    /// Decodes a buffer holding exactly one header and its payload.
    pub fn decode(buffer: &[u8], layout: HeaderLayout) -> Result<Self, CodecError> {
        let (header, payload) = layout.read_header(buffer)?;

        if header.length as usize != payload.len() {
            return Err(CodecError::LengthMismatch {
                declared: u64::from(header.length),
                available: payload.len(),
            });
        }

        Ok(Self {
            version: header.version,
            kind: header.kind,
            payload: payload.to_vec(),
        })
    }
}

impl std::fmt::Debug for StructuredMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("StructuredMeta")
            .field("version", &self.version)
            .field("kind", &format_args!("0x{:x}", self.kind))
            .field("length", &self.payload.len())
            .field("payload", &format_args!("{:02x?}", self.payload))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: [u8; 16] = [
        0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD,
        0xEF,
    ];

    fn sample() -> StructuredMeta {
        StructuredMeta::new(1, 0x1234, PAYLOAD)
    }

    #[test]
    fn header_sizes() {
        assert_eq!(HeaderLayout::Compact.header_len(), 8);
        assert_eq!(HeaderLayout::Wide.header_len(), 12);
        assert_eq!(HeaderLayout::WideReserved.header_len(), 16);
    }

    #[test]
    fn compact_wire_format() -> Result<(), CodecError> {
        let buffer = sample().encode(HeaderLayout::Compact)?;
        assert_eq!(buffer.len(), 8 + 16);
        assert_eq!(&buffer[0..2], &1u16.to_ne_bytes());
        assert_eq!(&buffer[2..4], &0x1234u16.to_ne_bytes());
        assert_eq!(&buffer[4..8], &16u32.to_ne_bytes());
        assert_eq!(&buffer[8..], &PAYLOAD);
        Ok(())
    }

    #[test]
    fn wide_reserved_wire_format() -> Result<(), CodecError> {
        let buffer = sample().encode(HeaderLayout::WideReserved)?;
        assert_eq!(buffer.len(), 16 + 16);
        assert_eq!(&buffer[8..12], &16u32.to_ne_bytes());
        assert_eq!(&buffer[12..16], &[0, 0, 0, 0]);
        assert_eq!(&buffer[16..], &PAYLOAD);
        Ok(())
    }

    #[test]
    fn round_trip_every_layout() -> Result<(), CodecError> {
        for layout in [
            HeaderLayout::Compact,
            HeaderLayout::Wide,
            HeaderLayout::WideReserved,
        ] {
            let meta = sample();
            assert_eq!(StructuredMeta::decode(&meta.encode(layout)?, layout)?, meta);

            let empty = StructuredMeta::new(7, 0, Vec::new());
            assert_eq!(StructuredMeta::decode(&empty.encode(layout)?, layout)?, empty);
        }
        Ok(())
    }

    #[test]
    fn layouts_are_distinct_encodings() -> Result<(), CodecError> {
        let buffer = sample().encode(HeaderLayout::Wide)?;
        assert!(StructuredMeta::decode(&buffer, HeaderLayout::Compact).is_err());
        Ok(())
    }

    #[test]
    fn compact_rejects_wide_fields() {
        let meta = StructuredMeta::new(0x1_0000, 1, PAYLOAD);
        assert_eq!(
            meta.encode(HeaderLayout::Compact),
            Err(CodecError::FieldOverflow {
                field: "version",
                value: 0x1_0000,
                layout: HeaderLayout::Compact,
            })
        );
        assert!(meta.encode(HeaderLayout::Wide).is_ok());
    }

    #[test]
    fn declared_length_must_match_available_bytes() -> Result<(), CodecError> {
        let mut buffer = sample().encode(HeaderLayout::Compact)?;

        buffer.push(0);
        assert_eq!(
            StructuredMeta::decode(&buffer, HeaderLayout::Compact),
            Err(CodecError::LengthMismatch {
                declared: 16,
                available: 17,
            })
        );

        buffer.truncate(8 + 10);
        assert_eq!(
            StructuredMeta::decode(&buffer, HeaderLayout::Compact),
            Err(CodecError::LengthMismatch {
                declared: 16,
                available: 10,
            })
        );
        Ok(())
    }

    #[test]
    fn short_buffer_is_truncated() {
        assert_eq!(
            StructuredMeta::decode(&[0; 5], HeaderLayout::Compact),
            Err(CodecError::Truncated {
                required: 8,
                available: 5,
            })
        );
    }

    #[test]
    fn reserved_word_must_be_zero() -> Result<(), CodecError> {
        let mut buffer = sample().encode(HeaderLayout::WideReserved)?;
        buffer[12] = 1;
        assert!(matches!(
            StructuredMeta::decode(&buffer, HeaderLayout::WideReserved),
            Err(CodecError::ReservedNotZero(_))
        ));
        Ok(())
    }
}
